use tracing::{info, warn};

use slotbook_core::domain::{UserId, UserProfile};
use slotbook_core::errors::{ApplicationError, DomainError};
use slotbook_core::flows::{
    RegistrationAction, RegistrationEvent, RegistrationState, TransitionOutcome,
};
use slotbook_core::session::Session;
use slotbook_sheets::StoreError;
use slotbook_telegram::{views, EventContext, Outbound};

use crate::assistant::{failure_text, BookingAssistant};

impl BookingAssistant {
    /// `/start`: reset to idle, look the user up, then greet or begin registration.
    pub(crate) async fn start(
        &self,
        user: UserId,
        chat_id: i64,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        let mut session = self.sessions.get_or_create(user);
        session.state = RegistrationState::Idle;
        session.pending_name = None;
        self.sessions.save(user, session.clone());

        let existing = match self.registry.find(user).await {
            Ok(existing) => existing,
            Err(error) => {
                return vec![Outbound::send(chat_id, views::failure(failure_text(error, ctx)))]
            }
        };

        self.advance(user, chat_id, &session, RegistrationEvent::StartRequested { existing }, ctx)
            .await
    }

    pub(crate) async fn free_text(
        &self,
        user: UserId,
        chat_id: i64,
        text: String,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        let session = self.sessions.get_or_create(user);
        self.advance(user, chat_id, &session, RegistrationEvent::TextReceived(text), ctx).await
    }

    /// `/my`: works from the session, falling back to the registry.
    pub(crate) async fn my_slots(
        &self,
        user: UserId,
        chat_id: i64,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        match self.resolve_profile(user).await {
            Ok(Some(profile)) => vec![self.listing(chat_id, &profile, ctx).await],
            Ok(None) => vec![Outbound::send(chat_id, views::register_first())],
            Err(error) => vec![Outbound::send(chat_id, views::failure(failure_text(error, ctx)))],
        }
    }

    /// Confirmed identity from the session, else from the registry (cached into the session).
    pub(crate) async fn resolve_profile(
        &self,
        user: UserId,
    ) -> Result<Option<UserProfile>, StoreError> {
        let mut session = self.sessions.get_or_create(user);
        if let Some(profile) = session.profile.clone() {
            return Ok(Some(profile));
        }

        let found = self.registry.find(user).await?;
        if let Some(profile) = &found {
            info!(
                event_name = "registration.session_restored",
                user_id = %user,
                "restored identity from registry"
            );
            session.profile = Some(profile.clone());
            self.sessions.save(user, session);
        }
        Ok(found)
    }

    /// Identity for a button click, or the message to send instead.
    pub(crate) async fn authenticate(
        &self,
        user: UserId,
        chat_id: i64,
        ctx: &EventContext,
    ) -> Result<UserProfile, Outbound> {
        match self.resolve_profile(user).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                warn!(
                    event_name = "assistant.unauthenticated_click",
                    correlation_id = %ctx.correlation_id,
                    user_id = %user,
                    "button click from unregistered user"
                );
                Err(Outbound::send(chat_id, views::authentication_error()))
            }
            Err(error) => Err(Outbound::send(chat_id, views::failure(failure_text(error, ctx)))),
        }
    }

    async fn advance(
        &self,
        user: UserId,
        chat_id: i64,
        session: &Session,
        event: RegistrationEvent,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        match self.flow.apply(session, &event) {
            Ok(outcome) => self.perform(user, chat_id, outcome, ctx).await,
            Err(error) => {
                let interface = ApplicationError::from(DomainError::from(error.clone()))
                    .into_interface(ctx.correlation_id.as_str());
                warn!(
                    event_name = "registration.transition_rejected",
                    correlation_id = %ctx.correlation_id,
                    user_id = %user,
                    error = %error,
                    "registration transition rejected; resetting session"
                );
                self.sessions.save(user, Session::default());
                vec![Outbound::send(chat_id, views::failure(interface.user_message()))]
            }
        }
    }

    /// Carries out the transition's actions in order. The new session is stored only once every
    /// action succeeded, so a failed registry append leaves the identifier prompt active.
    async fn perform(
        &self,
        user: UserId,
        chat_id: i64,
        outcome: TransitionOutcome,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for action in &outcome.actions {
            match action {
                RegistrationAction::GreetReturning { name } => {
                    outbound.push(Outbound::send(chat_id, views::greeting(name)));
                }
                RegistrationAction::PromptForName => {
                    outbound.push(Outbound::send(chat_id, views::name_prompt()));
                }
                RegistrationAction::PromptForIdentifier => {
                    outbound.push(Outbound::send(chat_id, views::identifier_prompt()));
                }
                RegistrationAction::PersistRegistration(profile) => {
                    if self.registry.register(user, profile).await.is_err() {
                        outbound.push(Outbound::send(chat_id, views::registration_not_saved()));
                        return outbound;
                    }
                    info!(
                        event_name = "registration.completed",
                        correlation_id = %ctx.correlation_id,
                        user_id = %user,
                        "user registered"
                    );
                }
                RegistrationAction::ConfirmRegistration => {
                    outbound.push(Outbound::send(chat_id, views::registration_confirmed()));
                }
                RegistrationAction::ShowDaySelection => {
                    outbound.push(self.day_selection(chat_id, ctx).await);
                }
                RegistrationAction::HintRestart => {
                    outbound.push(Outbound::send(chat_id, views::restart_hint()));
                }
            }
        }

        if outcome.from != outcome.to {
            info!(
                event_name = "registration.transitioned",
                correlation_id = %ctx.correlation_id,
                user_id = %user,
                from = ?outcome.from,
                to = ?outcome.to,
                "registration state changed"
            );
        }
        self.sessions.save(user, outcome.session);
        outbound
    }
}
