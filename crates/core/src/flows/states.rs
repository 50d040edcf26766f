use serde::{Deserialize, Serialize};

use crate::domain::UserProfile;
use crate::session::Session;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationState {
    #[default]
    Idle,
    AwaitingName,
    AwaitingIdentifier,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    /// `/start`, carrying the result of the registry lookup performed beforehand.
    StartRequested { existing: Option<UserProfile> },
    /// Any trimmed text that is not a command.
    TextReceived(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationAction {
    GreetReturning { name: String },
    PromptForName,
    PromptForIdentifier,
    PersistRegistration(UserProfile),
    ConfirmRegistration,
    ShowDaySelection,
    HintRestart,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RegistrationState,
    pub to: RegistrationState,
    pub event: RegistrationEvent,
    /// Session to store once the actions have been carried out.
    pub session: Session,
    pub actions: Vec<RegistrationAction>,
}
