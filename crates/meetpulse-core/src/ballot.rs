//! Ballot state transitions shared by question votes and pulse votes.
//!
//! A ballot is keyed by (subject, user) and holds at most one choice. Given
//! what the user currently holds and what they just asked for, [`transition`]
//! says what must happen to the stored row.

/// What to do when the requested choice equals the one already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatRule {
    /// Asking again withdraws the choice (question up/down votes).
    Toggle,
    /// Asking again changes nothing (pulse votes).
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<T> {
    /// No ballot yet: store one.
    Create(T),
    /// Same choice under [`RepeatRule::Toggle`]: delete the ballot.
    Retract(T),
    /// Different choice: overwrite the ballot in place.
    Replace { from: T, to: T },
    /// Same choice under [`RepeatRule::Keep`]: leave the ballot alone.
    Unchanged(T),
}

impl<T: Copy> Transition<T> {
    /// The choice the user holds after the transition is applied.
    pub fn resulting(self) -> Option<T> {
        match self {
            Transition::Create(choice) => Some(choice),
            Transition::Retract(_) => None,
            Transition::Replace { to, .. } => Some(to),
            Transition::Unchanged(choice) => Some(choice),
        }
    }
}

pub fn transition<T: Copy + PartialEq>(
    existing: Option<T>,
    requested: T,
    rule: RepeatRule,
) -> Transition<T> {
    match existing {
        None => Transition::Create(requested),
        Some(current) if current == requested => match rule {
            RepeatRule::Toggle => Transition::Retract(current),
            RepeatRule::Keep => Transition::Unchanged(current),
        },
        Some(current) => Transition::Replace {
            from: current,
            to: requested,
        },
    }
}
