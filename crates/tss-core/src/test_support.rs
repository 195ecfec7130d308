//! Shared fixtures for unit tests

use crate::engine::{Ed25519Engine, MpcEngine};
use crate::keygen::{KeyCombiner, KeyShareGenerator};
use crate::{KeyShare, Role, SigningMaterial, YShare};
use std::collections::BTreeMap;

/// Fresh DKG for all three roles, combined without the secure channel
pub(crate) fn materials() -> BTreeMap<Role, SigningMaterial> {
    let generator = KeyShareGenerator::new();
    let key_shares: BTreeMap<Role, KeyShare> = Role::ALL
        .into_iter()
        .map(|r| (r, generator.generate(r.index(), 2, 3).unwrap()))
        .collect();
    let received = |owner: Role| -> Vec<YShare> {
        owner
            .others()
            .into_iter()
            .map(|sender| key_shares[&sender].y_shares[&owner].clone())
            .collect()
    };

    let user_y = received(Role::User);
    let keychain = Ed25519Engine::new()
        .key_combine(
            &key_shares[&Role::User].u_share,
            &user_y.iter().collect::<Vec<_>>(),
        )
        .unwrap()
        .common_keychain;

    Role::ALL
        .into_iter()
        .map(|role| {
            let material = KeyCombiner::new()
                .combine_y_shares(&key_shares[&role], keychain.as_str(), received(role))
                .unwrap();
            (role, material)
        })
        .collect()
}
