//! Email one-time-code sign-up and log-in, account creation and sessions.
//!
//! Flow per (email, purpose): `initiate` stores a hashed code and mails it,
//! `verify` consumes it. Signing up creates the account on verification; the
//! very first account becomes the bootstrap admin, later ones wait for
//! approval unless auto-approval is on.

use std::sync::Arc;

use chrono::Duration;
use hmac::{Hmac, Mac};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use sha2::Sha256;
use tracing::{debug, info, warn};

use meetpulse_db::Database;
use meetpulse_db::queries::{challenges, users};
use meetpulse_types::api::{AuthStep, Claims, MeResponse};
use meetpulse_types::models::{OtpPurpose, ProfileFields, User};

use crate::access::Action;
use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::{CoreError, CoreResult};
use crate::notifier::{self, Notification, Notifier};

pub const CODE_LENGTH: usize = 6;
pub const MAX_CODE_ATTEMPTS: i64 = 5;
const MAX_EMAIL_LEN: usize = 255;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub code_ttl: Duration,
    pub session_ttl: Duration,
    /// Approve every verified signup instead of queueing it for an admin.
    pub auto_approve: bool,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::seconds(900),
            session_ttl: Duration::days(7),
            auto_approve: false,
        }
    }
}

/// A successful verification: who signed in, where to route them, and the
/// session token to hand back.
#[derive(Debug, Clone)]
pub struct Verified {
    pub step: AuthStep,
    pub user: User,
    pub token: String,
}

/// Outcome of checking a submitted code. Computed inside the write
/// transaction so counter bumps and deletions commit even when the caller
/// ends up with an error.
enum CodeCheck {
    Missing,
    Expired,
    Locked,
    Wrong { remaining: i64 },
    Accepted { user: Option<User>, created: bool },
}

pub struct IdentityGate {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    secret: Vec<u8>,
    settings: IdentitySettings,
}

impl IdentityGate {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        secret: &[u8],
        settings: IdentitySettings,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            secret: secret.to_vec(),
            settings,
        }
    }

    /// Issue a fresh code for `(email, purpose)` and mail it.
    ///
    /// Any earlier live code for the pair stops working. The answer is the
    /// same whether or not the email has an account; for a login request on
    /// an unknown email the challenge is stored but nothing is sent.
    /// Returns the normalized email.
    pub fn initiate(
        &self,
        email: &str,
        purpose: OtpPurpose,
        profile: ProfileFields,
    ) -> CoreResult<String> {
        let email = normalize_email(email)?;
        let profile = match purpose {
            OtpPurpose::Signup => clean_profile(profile),
            OtpPurpose::Login => ProfileFields::default(),
        };

        let code = generate_code();
        let code_hash = self.hash_code(&email, purpose, &code)?;
        let now = self.clock.now();
        let expires_at = now + self.settings.code_ttl;

        let has_account = self.db.with_tx(|tx| {
            challenges::replace_challenge(tx, &email, purpose, &code_hash, expires_at, &profile, now)?;
            Ok::<_, CoreError>(users::get_user_by_email(tx, &email)?.is_some())
        })?;

        if purpose == OtpPurpose::Login && !has_account {
            info!(email = %email, "LOGIN_OTP_SKIPPED (no account)");
            return Ok(email);
        }

        notifier::dispatch(
            self.notifier.clone(),
            Notification::Code {
                email: email.clone(),
                code,
                purpose,
                expires_in_minutes: self.settings.code_ttl.num_minutes(),
            },
        );

        match purpose {
            OtpPurpose::Signup => info!(email = %email, "SIGNUP_OTP_SENT"),
            OtpPurpose::Login => info!(email = %email, "LOGIN_OTP_SENT"),
        }
        Ok(email)
    }

    /// Check a submitted code and, on success, sign the user in.
    pub fn verify(&self, email: &str, code: &str, purpose: OtpPurpose) -> CoreResult<Verified> {
        let email = normalize_email(email)?;
        let code = code.trim();
        let submitted = self.code_mac(&email, purpose, code)?;
        let now = self.clock.now();
        let auto_approve = self.settings.auto_approve;

        let (check, admins) = self.db.with_tx(|tx| {
            let Some(challenge) = challenges::get_challenge(tx, &email, purpose)? else {
                return Ok::<_, CoreError>((CodeCheck::Missing, Vec::new()));
            };

            if now >= challenge.expires_at {
                challenges::delete_challenge(tx, &email, purpose)?;
                return Ok((CodeCheck::Expired, Vec::new()));
            }

            if challenge.attempt_count >= MAX_CODE_ATTEMPTS {
                return Ok((CodeCheck::Locked, Vec::new()));
            }

            if !code_matches(submitted, &challenge.code_hash) {
                let attempts = challenges::increment_attempts(tx, &email, purpose)?;
                let remaining = (MAX_CODE_ATTEMPTS - attempts).max(0);
                return Ok((CodeCheck::Wrong { remaining }, Vec::new()));
            }

            challenges::delete_challenge(tx, &email, purpose)?;

            if let Some(user) = users::get_user_by_email(tx, &email)? {
                return Ok((
                    CodeCheck::Accepted {
                        user: Some(user),
                        created: false,
                    },
                    Vec::new(),
                ));
            }

            if purpose == OtpPurpose::Login {
                return Ok((
                    CodeCheck::Accepted {
                        user: None,
                        created: false,
                    },
                    Vec::new(),
                ));
            }

            let staged = ProfileFields {
                name: challenge.staged_name,
                phone: challenge.staged_phone,
                bio: challenge.staged_bio,
            };
            let bootstrap = users::count_users(tx)? == 0;
            let approved = bootstrap || auto_approve;
            let user = users::insert_user(tx, &email, &staged, bootstrap, approved, now)?;
            let admins = if approved {
                Vec::new()
            } else {
                users::admin_emails(tx)?
            };

            Ok((
                CodeCheck::Accepted {
                    user: Some(user),
                    created: true,
                },
                admins,
            ))
        })?;

        let (user, created) = match check {
            CodeCheck::Missing => {
                warn!(email = %email, purpose = %purpose, "OTP_WRONG (no live code)");
                return Err(CoreError::CodeInvalid { remaining: None });
            }
            CodeCheck::Expired => {
                warn!(email = %email, purpose = %purpose, "OTP_EXPIRED");
                return Err(CoreError::CodeExpired);
            }
            CodeCheck::Locked => {
                warn!(email = %email, purpose = %purpose, "OTP_LOCKED (too many attempts)");
                return Err(CoreError::TooManyAttempts);
            }
            CodeCheck::Wrong { remaining } => {
                warn!(email = %email, purpose = %purpose, remaining, "OTP_WRONG");
                return Err(CoreError::CodeInvalid {
                    remaining: Some(remaining),
                });
            }
            CodeCheck::Accepted { user: None, .. } => return Err(CoreError::NotFound("account")),
            CodeCheck::Accepted {
                user: Some(user),
                created,
            } => (user, created),
        };

        for admin_email in admins {
            notifier::dispatch(
                self.notifier.clone(),
                Notification::PendingApproval {
                    admin_email,
                    user_name: user.name.clone(),
                    user_email: user.email.clone(),
                },
            );
        }

        let step = if user.is_approved {
            AuthStep::Authenticated
        } else {
            AuthStep::PendingApproval
        };

        match (purpose, step) {
            (OtpPurpose::Signup, AuthStep::PendingApproval) => {
                info!(email = %user.email, created, "SIGNUP_PENDING_APPROVAL")
            }
            (OtpPurpose::Signup, AuthStep::Authenticated) => {
                info!(email = %user.email, is_admin = user.is_admin, created, "SIGNUP_COMPLETE")
            }
            (OtpPurpose::Login, _) => info!(email = %user.email, ?step, "LOGIN_SUCCESS"),
        }

        let token = self.issue_session(&user)?;
        Ok(Verified { step, user, token })
    }

    pub fn issue_session(&self, user: &User) -> CoreResult<String> {
        let exp = (self.clock.now() + self.settings.session_ttl).timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            exp: usize::try_from(exp).map_err(|_| CoreError::Session("expiry out of range".into()))?,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| CoreError::Session(e.to_string()))
    }

    /// Turn a session token into a request context. Invalid, expired or
    /// orphaned tokens resolve to an anonymous context.
    pub fn resolve_session(&self, token: &str) -> CoreResult<RequestContext> {
        let claims = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Rejected session token: {}", e);
                return Ok(RequestContext::anonymous());
            }
        };

        let user = self
            .db
            .with_conn(|conn| users::get_user_by_id(conn, claims.sub))?;

        Ok(match user {
            Some(user) if user.email == claims.email => RequestContext::authenticated(user),
            _ => RequestContext::anonymous(),
        })
    }

    /// The signed-in user, plus the approval-queue length for admins.
    /// `None` when the request carries no valid session.
    pub fn current_user(&self, ctx: &RequestContext) -> CoreResult<Option<MeResponse>> {
        let Ok(user) = ctx.require(Action::ViewSession) else {
            return Ok(None);
        };

        let pending_approvals = if user.is_admin {
            self.db.with_conn(|conn| users::count_pending(conn))?
        } else {
            0
        };

        Ok(Some(MeResponse {
            user: user.clone(),
            pending_approvals,
        }))
    }

    /// Delete challenges whose code has expired. Returns how many were removed.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        let now = self.clock.now();
        self.db
            .with_tx(|tx| Ok::<_, CoreError>(challenges::delete_expired_challenges(tx, now)?))
    }

    fn hash_code(&self, email: &str, purpose: OtpPurpose, code: &str) -> CoreResult<String> {
        let mac = self.code_mac(email, purpose, code)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn code_mac(&self, email: &str, purpose: OtpPurpose, code: &str) -> CoreResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CoreError::Session(e.to_string()))?;
        mac.update(purpose.as_str().as_bytes());
        mac.update(b":");
        mac.update(email.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        Ok(mac)
    }
}

pub fn normalize_email(raw: &str) -> CoreResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(CoreError::Validation("Valid email required".into()));
    }
    Ok(email)
}

fn clean_profile(profile: ProfileFields) -> ProfileFields {
    fn clean(field: Option<String>) -> Option<String> {
        field
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    ProfileFields {
        name: clean(profile.name),
        phone: clean(profile.phone),
        bio: clean(profile.bio),
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Check a submitted code's MAC against the stored hex digest in constant time.
fn code_matches(submitted: HmacSha256, stored_hex: &str) -> bool {
    match hex::decode(stored_hex) {
        Ok(stored) => submitted.verify_slice(&stored).is_ok(),
        Err(_) => false,
    }
}
