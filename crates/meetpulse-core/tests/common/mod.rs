#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use meetpulse_core::RequestContext;
use meetpulse_core::clock::ManualClock;
use meetpulse_core::directory::Directory;
use meetpulse_core::identity::{IdentityGate, IdentitySettings, Verified, normalize_email};
use meetpulse_core::ledger::VoteLedger;
use meetpulse_core::notifier::{ChannelNotifier, Notification};
use meetpulse_core::pulse::PulseEngine;
use meetpulse_db::Database;
use meetpulse_types::models::{OtpPurpose, ProfileFields};

pub const SECRET: &[u8] = b"test-secret-key-for-meetpulse";

/// How long `code_for` waits for a mailed code.
pub const CODE_WAIT: Duration = Duration::from_secs(5);

/// Every core component wired to one in-memory database, a manual clock and a
/// notifier whose messages land in `outbox`.
pub struct Harness {
    pub db: Arc<Database>,
    pub clock: Arc<ManualClock>,
    pub gate: IdentityGate,
    pub ledger: VoteLedger,
    pub pulse: PulseEngine,
    pub directory: Directory,
    pub outbox: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(IdentitySettings::default())
    }

    pub fn with_settings(settings: IdentitySettings) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (notifier, outbox) = ChannelNotifier::new();

        Self {
            gate: IdentityGate::new(
                db.clone(),
                Arc::new(notifier),
                clock.clone(),
                SECRET,
                settings,
            ),
            ledger: VoteLedger::new(db.clone(), clock.clone()),
            pulse: PulseEngine::new(db.clone(), clock.clone()),
            directory: Directory::new(db.clone(), clock.clone()),
            db,
            clock,
            outbox,
        }
    }

    /// Wait for the next code mailed to `email`, skipping anything else.
    /// Fails the test if none arrives within [`CODE_WAIT`].
    pub async fn code_for(&mut self, email: &str) -> String {
        let email = normalize_email(email).unwrap();
        let wait = async {
            loop {
                match self.outbox.recv().await.expect("notifier channel closed") {
                    Notification::Code { email: to, code, .. } if to == email => return code,
                    _ => continue,
                }
            }
        };
        tokio::time::timeout(CODE_WAIT, wait)
            .await
            .unwrap_or_else(|_| panic!("no code mailed to {email}"))
    }

    pub async fn sign_up(&mut self, email: &str, name: &str) -> Verified {
        let profile = ProfileFields {
            name: Some(name.to_string()),
            ..Default::default()
        };
        self.gate.initiate(email, OtpPurpose::Signup, profile).unwrap();
        let code = self.code_for(email).await;
        self.gate.verify(email, &code, OtpPurpose::Signup).unwrap()
    }

    pub async fn log_in(&mut self, email: &str) -> Verified {
        self.gate
            .initiate(email, OtpPurpose::Login, ProfileFields::default())
            .unwrap();
        let code = self.code_for(email).await;
        self.gate.verify(email, &code, OtpPurpose::Login).unwrap()
    }

    /// Re-read the account behind a session, the way each HTTP request does.
    pub fn ctx(&self, verified: &Verified) -> RequestContext {
        self.gate.resolve_session(&verified.token).unwrap()
    }

    /// A bootstrap admin plus two approved members, with contexts.
    pub async fn admin_and_members(&mut self) -> (RequestContext, RequestContext, RequestContext) {
        let admin = self.sign_up("admin@example.com", "Admin").await;
        let alice = self.sign_up("alice@example.com", "Alice").await;
        let bob = self.sign_up("bob@example.com", "Bob").await;

        let admin_ctx = self.ctx(&admin);
        self.directory.approve_user(&admin_ctx, alice.user.id).unwrap();
        self.directory.approve_user(&admin_ctx, bob.user.id).unwrap();
        (admin_ctx, self.ctx(&alice), self.ctx(&bob))
    }
}
