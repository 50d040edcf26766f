use thiserror::Error;

use crate::domain::UserProfile;
use crate::flows::states::{
    RegistrationAction, RegistrationEvent, RegistrationState, TransitionOutcome,
};
use crate::session::Session;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("identifier received in {state:?} without a pending name")]
    MissingPendingName { state: RegistrationState },
}

/// Pure registration state machine. Side effects are described by the returned actions and
/// carried out by the caller, which then stores `outcome.session`.
#[derive(Clone, Debug, Default)]
pub struct RegistrationFlow;

impl RegistrationFlow {
    pub fn initial_state(&self) -> RegistrationState {
        RegistrationState::Idle
    }

    pub fn apply(
        &self,
        session: &Session,
        event: &RegistrationEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_registration(session, event)
    }
}

fn transition_registration(
    session: &Session,
    event: &RegistrationEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use RegistrationAction::{
        ConfirmRegistration, GreetReturning, HintRestart, PersistRegistration, PromptForIdentifier,
        PromptForName, ShowDaySelection,
    };
    use RegistrationEvent::{StartRequested, TextReceived};
    use RegistrationState::{AwaitingIdentifier, AwaitingName, Idle};

    let from = session.state;
    let mut next = session.clone();

    let actions = match (from, event) {
        (_, StartRequested { existing: Some(profile) }) => {
            next.state = Idle;
            next.pending_name = None;
            next.profile = Some(profile.clone());
            vec![GreetReturning { name: profile.display_name.clone() }, ShowDaySelection]
        }
        (_, StartRequested { existing: None }) => {
            next.state = AwaitingName;
            next.pending_name = None;
            vec![PromptForName]
        }
        (AwaitingName, TextReceived(name)) => {
            next.state = AwaitingIdentifier;
            next.pending_name = Some(name.clone());
            vec![PromptForIdentifier]
        }
        (AwaitingIdentifier, TextReceived(identifier)) => {
            let name = session
                .pending_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or(FlowTransitionError::MissingPendingName { state: from })?;
            let profile = UserProfile::new(name, identifier.as_str());

            next.state = Idle;
            next.pending_name = None;
            next.profile = Some(profile.clone());
            vec![PersistRegistration(profile), ConfirmRegistration, ShowDaySelection]
        }
        (Idle, TextReceived(_)) => {
            if session.is_registered() {
                vec![HintRestart]
            } else {
                Vec::new()
            }
        }
    };

    Ok(TransitionOutcome { from, to: next.state, event: event.clone(), session: next, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::UserProfile;
    use crate::flows::engine::{FlowTransitionError, RegistrationFlow};
    use crate::flows::states::{RegistrationAction, RegistrationEvent, RegistrationState};
    use crate::session::Session;

    fn text(value: &str) -> RegistrationEvent {
        RegistrationEvent::TextReceived(value.to_owned())
    }

    #[test]
    fn unknown_user_is_walked_through_registration() {
        let flow = RegistrationFlow;
        let session = Session::default();
        assert_eq!(session.state, flow.initial_state());

        let prompted = flow
            .apply(&session, &RegistrationEvent::StartRequested { existing: None })
            .expect("idle -> awaiting name");
        assert_eq!(prompted.to, RegistrationState::AwaitingName);
        assert_eq!(prompted.actions, vec![RegistrationAction::PromptForName]);

        let named = flow.apply(&prompted.session, &text("Alice Smith")).expect("name accepted");
        assert_eq!(named.to, RegistrationState::AwaitingIdentifier);
        assert_eq!(named.session.pending_name.as_deref(), Some("Alice Smith"));
        assert_eq!(named.actions, vec![RegistrationAction::PromptForIdentifier]);

        let registered = flow.apply(&named.session, &text("12345")).expect("identifier accepted");
        let profile = UserProfile::new("Alice Smith", "12345");
        assert_eq!(registered.to, RegistrationState::Idle);
        assert_eq!(registered.session.profile.as_ref(), Some(&profile));
        assert_eq!(registered.session.pending_name, None);
        assert_eq!(
            registered.actions,
            vec![
                RegistrationAction::PersistRegistration(profile),
                RegistrationAction::ConfirmRegistration,
                RegistrationAction::ShowDaySelection,
            ]
        );
    }

    #[test]
    fn start_with_registry_match_greets_and_shows_days() {
        let outcome = RegistrationFlow
            .apply(
                &Session::default(),
                &RegistrationEvent::StartRequested {
                    existing: Some(UserProfile::new("Alice Smith", "12345")),
                },
            )
            .expect("start");

        assert_eq!(outcome.to, RegistrationState::Idle);
        assert!(outcome.session.is_registered());
        assert_eq!(
            outcome.actions,
            vec![
                RegistrationAction::GreetReturning { name: "Alice Smith".to_owned() },
                RegistrationAction::ShowDaySelection,
            ]
        );
    }

    #[test]
    fn start_resets_a_half_finished_registration() {
        let session = Session {
            state: RegistrationState::AwaitingIdentifier,
            pending_name: Some("Bob".to_owned()),
            profile: None,
        };

        let outcome = RegistrationFlow
            .apply(&session, &RegistrationEvent::StartRequested { existing: None })
            .expect("restart");

        assert_eq!(outcome.from, RegistrationState::AwaitingIdentifier);
        assert_eq!(outcome.to, RegistrationState::AwaitingName);
        assert_eq!(outcome.session.pending_name, None);
    }

    #[test]
    fn idle_text_hints_only_for_registered_users() {
        let anonymous = RegistrationFlow.apply(&Session::default(), &text("hello")).expect("idle");
        assert!(anonymous.actions.is_empty());
        assert_eq!(anonymous.session, Session::default());

        let registered = Session {
            profile: Some(UserProfile::new("Alice", "1")),
            ..Session::default()
        };
        let hinted = RegistrationFlow.apply(&registered, &text("hello")).expect("idle");
        assert_eq!(hinted.actions, vec![RegistrationAction::HintRestart]);
        assert_eq!(hinted.to, RegistrationState::Idle);
    }

    #[test]
    fn identifier_without_pending_name_is_rejected() {
        let session = Session { state: RegistrationState::AwaitingIdentifier, ..Session::default() };

        let error = RegistrationFlow.apply(&session, &text("12345")).expect_err("no name");

        assert_eq!(
            error,
            FlowTransitionError::MissingPendingName { state: RegistrationState::AwaitingIdentifier }
        );
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let events = [RegistrationEvent::StartRequested { existing: None }, text("Ann"), text("9")];
        let run = || {
            let mut session = Session::default();
            let mut actions = Vec::new();
            for event in &events {
                let outcome = RegistrationFlow.apply(&session, event).expect("deterministic run");
                actions.push(outcome.actions);
                session = outcome.session;
            }
            (session, actions)
        };

        assert_eq!(run(), run());
    }
}
