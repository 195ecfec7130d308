//! Signing session coordinator
//!
//! Every provenance check runs on local data before the Coordination Service
//! is contacted, so an invalid share never leaves the process.

use super::{
    CommitmentShareRecord, SessionState, SignatureShareRecord, SigningSession, TxRequest,
    COMMITMENT_SHARE_TYPE,
};
use crate::codec;
use crate::engine::{Ed25519Engine, MpcEngine};
use crate::session::RemoteSessionClient;
use crate::{
    Error, GShare, PShare, RShare, Result, Role, SignShare, SigningMaterial, YShare,
};
use tracing::{debug, info, instrument};

/// Round-1 state handed from [`start_session`](SigningSessionCoordinator::start_session)
/// to [`complete_session`](SigningSessionCoordinator::complete_session)
#[derive(Debug)]
pub struct OfferedSession {
    session: SigningSession,
    sign_share: SignShare,
    payload: Vec<u8>,
}

impl OfferedSession {
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn tx_request_id(&self) -> &str {
        self.session.tx_request_id()
    }

    pub fn sign_share(&self) -> &SignShare {
        &self.sign_share
    }
}

/// Drives one party's side of a two-party signing session
#[derive(Debug, Clone)]
pub struct SigningSessionCoordinator<C, E = Ed25519Engine> {
    role: Role,
    counterparty: Role,
    client: C,
    engine: E,
}

impl<C: RemoteSessionClient> SigningSessionCoordinator<C> {
    pub fn new(role: Role, counterparty: Role, client: C) -> Result<Self> {
        Self::with_engine(role, counterparty, client, Ed25519Engine::new())
    }
}

fn track<T>(session: &mut SigningSession, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        session.fail(e);
    }
    result
}

impl<C: RemoteSessionClient, E: MpcEngine> SigningSessionCoordinator<C, E> {
    pub fn with_engine(role: Role, counterparty: Role, client: C, engine: E) -> Result<Self> {
        if role == counterparty {
            return Err(Error::InvalidConfig(format!(
                "{role} cannot sign with itself"
            )));
        }
        Ok(Self {
            role,
            counterparty,
            client,
            engine,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn counterparty(&self) -> Role {
        self.counterparty
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Round 1: nonce shares for `payload` with a fresh random nonce seed
    pub fn create_sign_share(&self, payload: &[u8], p_share: &PShare) -> Result<SignShare> {
        self.sign_share(payload, p_share, None)
    }

    /// [`create_sign_share`](Self::create_sign_share) with a fixed nonce seed.
    ///
    /// Never reuse a seed for the same payload against a fresh counterparty
    /// nonce: two signatures with one nonce reveal the key.
    pub fn create_sign_share_with_seed(
        &self,
        payload: &[u8],
        p_share: &PShare,
        seed: &[u8; 64],
    ) -> Result<SignShare> {
        self.sign_share(payload, p_share, Some(seed))
    }

    fn sign_share(
        &self,
        payload: &[u8],
        p_share: &PShare,
        seed: Option<&[u8; 64]>,
    ) -> Result<SignShare> {
        if p_share.i != self.role {
            return Err(Error::PShareOwnershipMismatch {
                expected: self.role,
                actual: p_share.i,
            });
        }
        self.engine
            .sign_share(payload, p_share, &[self.counterparty], seed)
    }

    fn own_r_share<'a>(&self, sign_share: &'a SignShare) -> Result<&'a RShare> {
        let r_share = sign_share
            .r_shares
            .get(&self.counterparty)
            .ok_or(Error::RShareNotFound(self.counterparty))?;

        if r_share.i != self.role || r_share.j != self.counterparty {
            return Err(Error::RShareProvenanceInvalid {
                expected_from: self.role,
                expected_to: self.counterparty,
                actual_from: r_share.i,
                actual_to: r_share.j,
            });
        }
        Ok(r_share)
    }

    /// Round-1 record `r ∥ R` for the counterparty
    pub fn r_share_record(&self, sign_share: &SignShare) -> Result<SignatureShareRecord> {
        let r_share = self.own_r_share(sign_share)?;
        Ok(SignatureShareRecord {
            from: self.role,
            to: self.counterparty,
            share: codec::encode_r_share(&r_share.r, &r_share.big_r),
        })
    }

    /// Commitment to the r-share offered to the counterparty
    pub fn commitment_record(&self, sign_share: &SignShare) -> Result<CommitmentShareRecord> {
        let r_share = self.own_r_share(sign_share)?;
        let commitment = r_share.commitment.ok_or_else(|| {
            Error::Codec(format!("r-share for {} carries no commitment", r_share.j))
        })?;

        Ok(CommitmentShareRecord {
            from: self.role,
            to: self.counterparty,
            share: hex::encode(commitment),
            share_type: COMMITMENT_SHARE_TYPE.to_string(),
        })
    }

    /// Submit the round-1 record to the Coordination Service
    #[instrument(skip(self, sign_share, signer_share), fields(role = %self.role, counterparty = %self.counterparty))]
    pub async fn offer_r_share(
        &self,
        tx_request_id: &str,
        sign_share: &SignShare,
        signer_share: Option<&str>,
    ) -> Result<SignatureShareRecord> {
        let record = self.r_share_record(sign_share)?;
        debug!("Offering r-share");
        self.client
            .send_signature_share(tx_request_id, &record, signer_share)
            .await
    }

    /// First record in the log sent by the counterparty to this party
    pub fn select_counterparty_r_share(
        &self,
        tx_request: &TxRequest,
    ) -> Result<SignatureShareRecord> {
        if tx_request.signature_shares.is_empty() {
            return Err(Error::NoSignatureShares(tx_request.tx_request_id.clone()));
        }

        tx_request
            .signature_shares
            .iter()
            .find(|record| record.from == self.counterparty && record.to == self.role)
            .cloned()
            .ok_or_else(|| Error::CounterpartyRShareNotFound {
                from: self.counterparty,
                to: self.role,
                tx_request_id: tx_request.tx_request_id.clone(),
            })
    }

    /// Fails when the log already holds a record from this party to the
    /// counterparty. A second r-share would never be selected, so the
    /// session could not complete on this TxRequest.
    pub fn check_not_offered(&self, tx_request: &TxRequest) -> Result<()> {
        let offered = tx_request
            .signature_shares
            .iter()
            .any(|record| record.from == self.role && record.to == self.counterparty);
        if offered {
            return Err(Error::RShareAlreadyOffered {
                from: self.role,
                to: self.counterparty,
                tx_request_id: tx_request.tx_request_id.clone(),
            });
        }
        Ok(())
    }

    /// Fetch the TxRequest and pick the counterparty's round-1 record
    #[instrument(skip(self), fields(role = %self.role, counterparty = %self.counterparty))]
    pub async fn fetch_counterparty_r_share(
        &self,
        tx_request_id: &str,
    ) -> Result<SignatureShareRecord> {
        let tx_request = self.client.get_tx_request(tx_request_id).await?;
        self.select_counterparty_r_share(&tx_request)
    }

    /// Round 2: this party's g-share.
    ///
    /// `counterparty_y_share` and `third_y_share` are the key-generation
    /// shares the caller received from the counterparty and from the third
    /// party. `commitment`, when present, must open to the counterparty's r.
    pub fn create_g_share(
        &self,
        sign_share: &SignShare,
        counterparty_r_share: &SignatureShareRecord,
        counterparty_y_share: &YShare,
        third_y_share: &YShare,
        payload: &[u8],
        commitment: Option<&CommitmentShareRecord>,
    ) -> Result<GShare> {
        let x_share = &sign_share.x_share;
        if x_share.i != self.role {
            return Err(Error::XShareOwnershipMismatch {
                expected: self.role,
                actual: x_share.i,
            });
        }
        self.check_incoming(counterparty_r_share.from, counterparty_r_share.to)?;

        let third = self.role.third(self.counterparty)?;
        for (y_share, sender) in [(counterparty_y_share, self.counterparty), (third_y_share, third)]
        {
            if y_share.i != sender || y_share.j != self.role {
                return Err(Error::YShareProvenanceInvalid(format!(
                    "expected a {sender}->{} y-share, got {}->{}",
                    self.role, y_share.i, y_share.j
                )));
            }
        }

        let commitment = match commitment {
            Some(record) => {
                self.check_incoming(record.from, record.to)?;
                if record.share_type != COMMITMENT_SHARE_TYPE {
                    return Err(Error::InvalidCommitmentType(record.share_type.clone()));
                }
                Some(codec::decode_field("commitment", &record.share)?)
            }
            None => None,
        };

        let (r, big_r) = codec::decode_r_share(&counterparty_r_share.share)?;
        let r_share = RShare {
            i: self.counterparty,
            j: self.role,
            r,
            big_r,
            commitment,
        };

        self.engine.sign(
            payload,
            x_share,
            &[r_share],
            &[counterparty_y_share, third_y_share],
        )
    }

    fn check_incoming(&self, from: Role, to: Role) -> Result<()> {
        if from != self.counterparty || to != self.role {
            return Err(Error::RShareDirectionInvalid {
                expected_from: self.counterparty,
                expected_to: self.role,
                actual_from: from,
                actual_to: to,
            });
        }
        Ok(())
    }

    /// Round-2 record `R ∥ gamma` for the counterparty
    pub fn g_share_record(&self, g_share: &GShare) -> Result<SignatureShareRecord> {
        if g_share.i != self.role {
            return Err(Error::GShareOwnershipMismatch {
                expected: self.role,
                actual: g_share.i,
            });
        }
        Ok(SignatureShareRecord {
            from: self.role,
            to: self.counterparty,
            share: codec::encode_g_share(&g_share.big_r, &g_share.gamma),
        })
    }

    /// Submit the round-2 record to the Coordination Service
    #[instrument(skip(self, g_share), fields(role = %self.role, counterparty = %self.counterparty))]
    pub async fn offer_g_share(
        &self,
        tx_request_id: &str,
        g_share: &GShare,
    ) -> Result<SignatureShareRecord> {
        let record = self.g_share_record(g_share)?;
        debug!("Offering g-share");
        self.client
            .send_signature_share(tx_request_id, &record, None)
            .await
    }

    /// Round 1 against the key at `path`: derive and create the sign share,
    /// then offer the r-share unless this party already offered one on the
    /// TxRequest
    #[instrument(skip(self, payload, material, signer_share), fields(role = %self.role, counterparty = %self.counterparty))]
    pub async fn start_session(
        &self,
        tx_request_id: &str,
        payload: &[u8],
        material: &SigningMaterial,
        path: &str,
        signer_share: Option<&str>,
    ) -> Result<OfferedSession> {
        let mut session = SigningSession::new(tx_request_id, self.role);

        let p_share = track(
            &mut session,
            self.engine
                .key_derive(&material.u_share, &material.y_shares(), path),
        )?;
        let sign_share = track(&mut session, self.create_sign_share(payload, &p_share))?;
        session.advance(SessionState::XShareReady)?;

        let fetched = self.client.get_tx_request(tx_request_id).await;
        let tx_request = track(&mut session, fetched)?;
        track(&mut session, self.check_not_offered(&tx_request))?;

        let offered = self
            .offer_r_share(tx_request_id, &sign_share, signer_share)
            .await;
        track(&mut session, offered)?;
        session.advance(SessionState::RShareOffered)?;
        session.advance(SessionState::AwaitingCounterpartyRShare)?;

        info!(tx_request_id, path, "Round 1 complete");
        Ok(OfferedSession {
            session,
            sign_share,
            payload: payload.to_vec(),
        })
    }

    /// Round 2 once the counterparty's r-share has been observed
    #[instrument(skip_all, fields(role = %self.role, tx_request_id = %offered.tx_request_id()))]
    pub async fn complete_session(
        &self,
        mut offered: OfferedSession,
        material: &SigningMaterial,
        counterparty_r_share: &SignatureShareRecord,
        commitment: Option<&CommitmentShareRecord>,
    ) -> Result<GShare> {
        let session = &mut offered.session;
        let third = track(session, self.role.third(self.counterparty))?;
        let counterparty_y_share = track(
            session,
            material
                .peers
                .from_sender(self.counterparty)
                .ok_or(Error::MissingYShare(self.counterparty)),
        )?;
        let third_y_share = track(
            session,
            material
                .peers
                .from_sender(third)
                .ok_or(Error::MissingYShare(third)),
        )?;

        let g_share = track(
            session,
            self.create_g_share(
                &offered.sign_share,
                counterparty_r_share,
                counterparty_y_share,
                third_y_share,
                &offered.payload,
                commitment,
            ),
        )?;
        session.advance(SessionState::GShareReady)?;

        let tx_request_id = session.tx_request_id().to_string();
        let sent = self.offer_g_share(&tx_request_id, &g_share).await;
        track(session, sent)?;
        session.advance(SessionState::Submitted)?;

        info!("Round 2 complete");
        Ok(g_share)
    }

    /// Both rounds back to back, for a counterparty that answers the
    /// r-share before this party fetches the log
    pub async fn run_signing_session(
        &self,
        tx_request_id: &str,
        payload: &[u8],
        material: &SigningMaterial,
        path: &str,
        signer_share: Option<&str>,
    ) -> Result<GShare> {
        let mut offered = self
            .start_session(tx_request_id, payload, material, path, signer_share)
            .await?;

        let fetched = self.fetch_counterparty_r_share(tx_request_id).await;
        let counterparty_r_share = track(&mut offered.session, fetched)?;

        self.complete_session(offered, material, &counterparty_r_share, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionClient;
    use crate::sign::UnsignedTx;
    use crate::test_support::materials;
    use crate::XShare;
    use std::collections::BTreeMap;

    const PAYLOAD: &[u8] = b"MPC on a Friday night";

    fn coordinator(
        role: Role,
        counterparty: Role,
        client: &MemorySessionClient,
    ) -> SigningSessionCoordinator<MemorySessionClient> {
        SigningSessionCoordinator::new(role, counterparty, client.clone()).unwrap()
    }

    fn p_share(material: &SigningMaterial) -> PShare {
        Ed25519Engine::new()
            .key_derive(&material.u_share, &material.y_shares(), "m/0")
            .unwrap()
    }

    fn tx_request(client: &MemorySessionClient) -> TxRequest {
        client.create_tx_request(vec![UnsignedTx {
            signable_hex: hex::encode(PAYLOAD),
            serialized_tx_hex: "00".into(),
        }])
    }

    fn record(from: Role, to: Role) -> SignatureShareRecord {
        SignatureShareRecord {
            from,
            to,
            share: format!("{}{}", "11".repeat(32), "22".repeat(32)),
        }
    }

    #[test]
    fn test_rejects_self_counterparty() {
        let err =
            SigningSessionCoordinator::new(Role::User, Role::User, MemorySessionClient::new())
                .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_sign_share_ownership() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);

        let err = user
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::Bitgo]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PShareOwnershipMismatch {
                expected: Role::User,
                actual: Role::Bitgo
            }
        ));

        let sign_share = user
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::User]))
            .unwrap();
        assert_eq!(sign_share.x_share.i, Role::User);
        assert_eq!(sign_share.r_shares.len(), 1);
        let r_share = &sign_share.r_shares[&Role::Bitgo];
        assert_eq!((r_share.i, r_share.j), (Role::User, Role::Bitgo));
        assert_ne!(r_share.r, [0u8; 32]);
        assert_ne!(sign_share.x_share.u, [0u8; 32]);
    }

    #[tokio::test]
    async fn test_offer_r_share_checks_before_sending() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let tx = tx_request(&client);
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let user_backup = coordinator(Role::User, Role::Backup, &client);

        let sign_share = user
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::User]))
            .unwrap();

        // prepared for bitgo, offered to backup
        let err = user_backup
            .offer_r_share(&tx.tx_request_id, &sign_share, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RShareNotFound(Role::Backup)));

        let mut tampered = sign_share.clone();
        if let Some(r_share) = tampered.r_shares.get_mut(&Role::Bitgo) {
            r_share.i = Role::Backup;
        }
        let err = user
            .offer_r_share(&tx.tx_request_id, &tampered, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RShareProvenanceInvalid { .. }));

        let log = client.get_tx_request(&tx.tx_request_id).await.unwrap();
        assert!(log.signature_shares.is_empty());

        let sent = user
            .offer_r_share(&tx.tx_request_id, &sign_share, Some("signer"))
            .await
            .unwrap();
        assert_eq!((sent.from, sent.to), (Role::User, Role::Bitgo));
        assert_eq!(sent.share.len(), 128);
    }

    #[test]
    fn test_select_counterparty_r_share() {
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let mut tx = tx_request(&client);

        let err = user.select_counterparty_r_share(&tx).unwrap_err();
        assert!(matches!(err, Error::NoSignatureShares(_)));

        tx.signature_shares = vec![record(Role::User, Role::Bitgo), record(Role::User, Role::Bitgo)];
        let err = user.select_counterparty_r_share(&tx).unwrap_err();
        assert!(matches!(
            err,
            Error::CounterpartyRShareNotFound {
                from: Role::Bitgo,
                to: Role::User,
                ..
            }
        ));

        let mut expected = record(Role::Bitgo, Role::User);
        expected.share = "33".repeat(64);
        tx.signature_shares.push(expected.clone());
        tx.signature_shares.push(record(Role::Bitgo, Role::User));
        tx.signature_shares.push(record(Role::Bitgo, Role::Backup));
        assert_eq!(user.select_counterparty_r_share(&tx).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_fetch_counterparty_r_share_reports_missing_tx_request() {
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let err = user.fetch_counterparty_r_share("unknown").await.unwrap_err();
        assert!(matches!(err, Error::TxRequestNotFound(_)));
    }

    #[test]
    fn test_g_share_direction_checks() {
        let materials = materials();
        let client = MemorySessionClient::new();

        for (me, counterparty) in [(Role::User, Role::Bitgo), (Role::Bitgo, Role::User)] {
            let coordinator = coordinator(me, counterparty, &client);
            let material = &materials[&me];
            let sign_share = coordinator
                .create_sign_share(PAYLOAD, &p_share(material))
                .unwrap();
            let third = me.third(counterparty).unwrap();
            let counterparty_y = material.peers.from_sender(counterparty).unwrap();
            let third_y = material.peers.from_sender(third).unwrap();

            for bad in [
                record(me, counterparty),
                record(counterparty, counterparty),
                record(me, me),
                record(counterparty, third),
            ] {
                let err = coordinator
                    .create_g_share(&sign_share, &bad, counterparty_y, third_y, PAYLOAD, None)
                    .unwrap_err();
                assert!(matches!(err, Error::RShareDirectionInvalid { .. }));
            }

            // y-shares swapped
            let err = coordinator
                .create_g_share(
                    &sign_share,
                    &record(counterparty, me),
                    third_y,
                    counterparty_y,
                    PAYLOAD,
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, Error::YShareProvenanceInvalid(_)));
        }
    }

    #[test]
    fn test_g_share_ownership_checks() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let bitgo = coordinator(Role::Bitgo, Role::User, &client);

        let bitgo_sign_share = bitgo
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::Bitgo]))
            .unwrap();
        let material = &materials[&Role::User];
        let err = user
            .create_g_share(
                &bitgo_sign_share,
                &record(Role::Bitgo, Role::User),
                material.peers.from_sender(Role::Bitgo).unwrap(),
                material.peers.from_sender(Role::Backup).unwrap(),
                PAYLOAD,
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::XShareOwnershipMismatch {
                expected: Role::User,
                actual: Role::Bitgo
            }
        ));

        let g_share = GShare {
            i: Role::Bitgo,
            y: [0; 32],
            gamma: [0; 32],
            big_r: [0; 32],
        };
        let err = user.g_share_record(&g_share).unwrap_err();
        assert!(matches!(err, Error::GShareOwnershipMismatch { .. }));
    }

    #[test]
    fn test_commitment_checks() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let bitgo = coordinator(Role::Bitgo, Role::User, &client);

        let user_sign_share = user
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::User]))
            .unwrap();
        let bitgo_sign_share = bitgo
            .create_sign_share(PAYLOAD, &p_share(&materials[&Role::Bitgo]))
            .unwrap();
        let bitgo_r = bitgo.r_share_record(&bitgo_sign_share).unwrap();
        let commitment = bitgo.commitment_record(&bitgo_sign_share).unwrap();

        let material = &materials[&Role::User];
        let bitgo_y = material.peers.from_sender(Role::Bitgo).unwrap();
        let backup_y = material.peers.from_sender(Role::Backup).unwrap();
        let g_share = |commitment: &CommitmentShareRecord| {
            user.create_g_share(
                &user_sign_share,
                &bitgo_r,
                bitgo_y,
                backup_y,
                PAYLOAD,
                Some(commitment),
            )
        };

        assert!(g_share(&commitment).is_ok());

        let mut wrong_type = commitment.clone();
        wrong_type.share_type = "rshare".into();
        assert!(matches!(
            g_share(&wrong_type).unwrap_err(),
            Error::InvalidCommitmentType(t) if t == "rshare"
        ));

        let mut reversed = commitment.clone();
        reversed.from = Role::User;
        reversed.to = Role::Bitgo;
        assert!(matches!(
            g_share(&reversed).unwrap_err(),
            Error::RShareDirectionInvalid { .. }
        ));

        let mut forged = commitment.clone();
        forged.share = hex::encode(user_sign_share.x_share.big_r);
        assert!(matches!(
            g_share(&forged).unwrap_err(),
            Error::CommitmentMismatch(Role::Bitgo)
        ));
    }

    fn h(value: &str) -> [u8; 32] {
        codec::decode_field("test", value).unwrap()
    }

    #[test]
    fn test_g_share_reproduces_fixture() {
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);

        let sign_share = SignShare {
            x_share: XShare {
                i: Role::User,
                y: h("4d9343988e68191aac945a6963031dddde3490f9020d0571a6e6c6e15cca0296"),
                u: h("1e159d6a0ae3a8dccc74615113e7c3e25d3080e5e0ffeb0ae04dd6a967268102"),
                r: h("c8f64cc48926216c3f60e1d8ff1e24eba060d7c1ff020d0fc1d735d4564efd03"),
                big_r: h("9be2208ee28cd4b2577a9a66f6aab1ed8b08a300969eeb9b203a52aa54d2c23c"),
            },
            r_shares: BTreeMap::new(),
        };
        let bitgo_to_user = SignatureShareRecord {
            from: Role::Bitgo,
            to: Role::User,
            share: concat!(
                "0375e8c5a5691a73c21df00d49d423e3f83fe08d7b5d5af33c5c6aa9cae59d0a",
                "c883fe2ae9b8da1764cc36a526cfa1a21f81d604320b209867f8de9223f1de32"
            )
            .to_string(),
        };
        let bitgo_y = YShare {
            i: Role::Bitgo,
            j: Role::User,
            y: h("59d8000ba5e85fa402f39382960e7d5ede82b1b6e22b146a18b7df238c3a3225"),
            v: Some(h(
                "01ea3f425b1adf8aec6cfe4fc8f9b94755c34657965f32397655dcd784f1b517",
            )),
            u: h("9ce3204a8c9757738967f3f81b463d87267bf6f2c0e5eaf2843167537b872b0b"),
            chaincode: h("d21dbd8eae5d4789292ecea2efa53e0165b2439d57f5158eb4dd57dc26b59236"),
        };
        let backup_y = YShare {
            i: Role::Backup,
            j: Role::User,
            y: h("e0ae75077715686a121acb41b29a55bde426971154f40a41fc317f7f774a9424"),
            v: Some(h(
                "f76ef629dfc15ab5e4531e532b5d67f2176637ca752b195876b7e3172459c969",
            )),
            u: h("fe6b89fb6acfcd7392c35c084f58bde0846b888c4df57e466caf0a3271b06a05"),
            chaincode: h("1c34e5dfbbd4a870f4479caaa5e6a46e3438f976ad5aefd4905b8fe8bca1101e"),
        };

        let expected = GShare {
            i: Role::User,
            y: sign_share.x_share.y,
            gamma: h("ce87a00d17e52b91bc5bb6e275983b84fc1998b2b37f7166c671a019c33d3905"),
            big_r: h("aa6e5bad24ad4131b8793dcb95c72e03c5426456ab0b52fc99d61d7103c2f01b"),
        };
        for _ in 0..3 {
            let g_share = user
                .create_g_share(&sign_share, &bitgo_to_user, &bitgo_y, &backup_y, PAYLOAD, None)
                .unwrap();
            assert_eq!(g_share, expected);
        }

        let record = user.g_share_record(&expected).unwrap();
        assert!(record.share.starts_with("aa6e5bad"));
    }

    #[test]
    fn test_seeded_rounds_are_reproducible() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let bitgo = coordinator(Role::Bitgo, Role::User, &client);
        let (m_user, m_bitgo) = (&materials[&Role::User], &materials[&Role::Bitgo]);
        let peer = |material: &SigningMaterial, sender: Role| {
            material.peers.from_sender(sender).unwrap().clone()
        };

        let run = || {
            let user_sign = user
                .create_sign_share_with_seed(PAYLOAD, &p_share(m_user), &[7u8; 64])
                .unwrap();
            let bitgo_sign = bitgo
                .create_sign_share_with_seed(PAYLOAD, &p_share(m_bitgo), &[9u8; 64])
                .unwrap();

            let user_g = user
                .create_g_share(
                    &user_sign,
                    &bitgo.r_share_record(&bitgo_sign).unwrap(),
                    &peer(m_user, Role::Bitgo),
                    &peer(m_user, Role::Backup),
                    PAYLOAD,
                    Some(&bitgo.commitment_record(&bitgo_sign).unwrap()),
                )
                .unwrap();
            let bitgo_g = bitgo
                .create_g_share(
                    &bitgo_sign,
                    &user.r_share_record(&user_sign).unwrap(),
                    &peer(m_bitgo, Role::User),
                    &peer(m_bitgo, Role::Backup),
                    PAYLOAD,
                    Some(&user.commitment_record(&user_sign).unwrap()),
                )
                .unwrap();
            (user_sign, user_g, bitgo_g)
        };

        let (first_sign, first_user_g, first_bitgo_g) = run();
        let (second_sign, second_user_g, second_bitgo_g) = run();
        assert_eq!(first_sign.x_share, second_sign.x_share);
        assert_eq!(first_sign.r_shares, second_sign.r_shares);
        assert_eq!(first_user_g, second_user_g);
        assert_eq!(first_bitgo_g, second_bitgo_g);

        let engine = Ed25519Engine::new();
        let signature = engine.sign_combine(&[first_user_g, first_bitgo_g]).unwrap();
        engine.verify(PAYLOAD, &signature).unwrap();
    }

    #[tokio::test]
    async fn test_restart_on_same_tx_request_is_rejected() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let tx = tx_request(&client);
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let bitgo = coordinator(Role::Bitgo, Role::User, &client);

        let _abandoned = user
            .start_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::User], "m/0", None)
            .await
            .unwrap();

        let err = user
            .start_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::User], "m/0", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RShareAlreadyOffered {
                from: Role::User,
                to: Role::Bitgo,
                ..
            }
        ));
        assert_eq!(err.kind(), crate::ErrorKind::LocalValidation);

        let log = client.get_tx_request(&tx.tx_request_id).await.unwrap();
        assert_eq!(log.signature_shares.len(), 1);

        // the counterparty's own offer is unaffected by the user's earlier one
        let bitgo_offered = bitgo
            .start_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::Bitgo], "m/0", None)
            .await
            .unwrap();
        drop(bitgo_offered);

        // restarting on a fresh TxRequest signs
        let fresh = tx_request(&client);
        let bitgo_offered = bitgo
            .start_session(&fresh.tx_request_id, PAYLOAD, &materials[&Role::Bitgo], "m/0", None)
            .await
            .unwrap();
        let user_g = user
            .run_signing_session(&fresh.tx_request_id, PAYLOAD, &materials[&Role::User], "m/0", None)
            .await
            .unwrap();
        let user_r = bitgo
            .fetch_counterparty_r_share(&fresh.tx_request_id)
            .await
            .unwrap();
        let bitgo_g = bitgo
            .complete_session(bitgo_offered, &materials[&Role::Bitgo], &user_r, None)
            .await
            .unwrap();

        let engine = Ed25519Engine::new();
        let signature = engine.sign_combine(&[user_g, bitgo_g]).unwrap();
        engine.verify(PAYLOAD, &signature).unwrap();
    }

    #[tokio::test]
    async fn test_two_party_session_over_memory_client() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let tx = tx_request(&client);
        let user = coordinator(Role::User, Role::Bitgo, &client);
        let bitgo = coordinator(Role::Bitgo, Role::User, &client);

        // bitgo answers first, so the user can run both rounds in one call
        let bitgo_offered = bitgo
            .start_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::Bitgo], "m/0", None)
            .await
            .unwrap();
        assert_eq!(
            bitgo_offered.state(),
            SessionState::AwaitingCounterpartyRShare
        );

        let user_g = user
            .run_signing_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::User], "m/0", None)
            .await
            .unwrap();

        let user_r = bitgo
            .fetch_counterparty_r_share(&tx.tx_request_id)
            .await
            .unwrap();
        let bitgo_g = bitgo
            .complete_session(bitgo_offered, &materials[&Role::Bitgo], &user_r, None)
            .await
            .unwrap();

        let engine = Ed25519Engine::new();
        let signature = engine.sign_combine(&[user_g, bitgo_g]).unwrap();
        engine.verify(PAYLOAD, &signature).unwrap();

        let child = engine
            .derive_common_keychain(materials[&Role::User].common_keychain.as_str(), "m/0")
            .unwrap();
        assert_eq!(child[..64], hex::encode(signature.y));

        let log = client.get_tx_request(&tx.tx_request_id).await.unwrap();
        assert_eq!(log.signature_shares.len(), 4);
    }

    #[tokio::test]
    async fn test_session_fails_without_counterparty_share() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let tx = tx_request(&client);
        let user = coordinator(Role::User, Role::Bitgo, &client);

        let err = user
            .run_signing_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::User], "m/0", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CounterpartyRShareNotFound { .. }));
    }

    #[tokio::test]
    async fn test_session_rejects_foreign_material() {
        let materials = materials();
        let client = MemorySessionClient::new();
        let tx = tx_request(&client);
        let user = coordinator(Role::User, Role::Bitgo, &client);

        let err = user
            .start_session(&tx.tx_request_id, PAYLOAD, &materials[&Role::Backup], "m/0", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PShareOwnershipMismatch { .. }));

        let log = client.get_tx_request(&tx.tx_request_id).await.unwrap();
        assert!(log.signature_shares.is_empty());
    }
}
