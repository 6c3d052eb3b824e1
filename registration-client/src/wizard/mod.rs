//! The registration wizard as a value: every event produces a new state and a
//! directive for what to show next.

use retreat_shared::models::MemberDetails;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::api::{FamilyMembers, RecordStoreApi};
use crate::error::ClientError;

mod flow;

pub use flow::advance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    SelectType,
    IndividualName,
    IndividualForm,
    FamilyCheck,
    FamilyNew,
    FamilySearch,
    FamilySelect,
    FamilyConfirm,
    FamilyPage,
    Success,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::SelectType => "select-type",
            Step::IndividualName => "individual-name",
            Step::IndividualForm => "individual-form",
            Step::FamilyCheck => "family-check",
            Step::FamilyNew => "family-new",
            Step::FamilySearch => "family-search",
            Step::FamilySelect => "family-select",
            Step::FamilyConfirm => "family-confirm",
            Step::FamilyPage => "family-page",
            Step::Success => "success",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationType {
    Individual,
    Family,
}

/// Contact fields typed into a form, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactForm {
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    ChooseIndividual,
    ChooseFamily,
    EnterName { name: String },
    SubmitIndividual(ContactForm),
    NewFamily,
    ExistingFamily,
    CreateFamily { head_name: String },
    /// A family id, or a member email when it contains `@`
    Search { query: String },
    SelectFamily { family_id: String },
    ConfirmFamily,
    AddMember { name: String, contact: ContactForm },
    RemoveMember { id: String },
    Complete,
    Back,
    StartOver,
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::ChooseIndividual => "choose-individual",
            WizardEvent::ChooseFamily => "choose-family",
            WizardEvent::EnterName { .. } => "enter-name",
            WizardEvent::SubmitIndividual(_) => "submit-individual",
            WizardEvent::NewFamily => "new-family",
            WizardEvent::ExistingFamily => "existing-family",
            WizardEvent::CreateFamily { .. } => "create-family",
            WizardEvent::Search { .. } => "search",
            WizardEvent::SelectFamily { .. } => "select-family",
            WizardEvent::ConfirmFamily => "confirm-family",
            WizardEvent::AddMember { .. } => "add-member",
            WizardEvent::RemoveMember { .. } => "remove-member",
            WizardEvent::Complete => "complete",
            WizardEvent::Back => "back",
            WizardEvent::StartOver => "start-over",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WizardError {
    #[error("Please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Cannot {event} from the {step} step")]
    InvalidTransition { step: Step, event: &'static str },

    #[error("Nothing to submit: no new family members.")]
    NothingToSubmit,

    #[error("{0} is already registered and cannot be removed here.")]
    CannotRemovePersisted(String),

    #[error("No member {0} in this family.")]
    UnknownMember(String),

    #[error("No family {0} among the search results.")]
    UnknownCandidate(String),

    #[error(transparent)]
    Api(#[from] ClientError),
}

/// What the caller should display after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Render {
    Step(Step),
    Error { step: Step, error: WizardError },
    Done { message: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WizardState {
    pub step: Step,
    pub registration_type: Option<RegistrationType>,
    pub individual_id: Option<String>,
    pub individual_name: String,
    pub family_id: Option<String>,
    pub family_head: String,
    pub family_members: Vec<MemberDetails>,
    pub is_existing_family: bool,
    /// Ids already persisted for the bound family
    pub existing_member_ids: BTreeSet<String>,
    /// Families found by an email search that matched more than one
    pub candidates: Vec<FamilyMembers>,
    /// Read-only preview shown before binding to a family
    pub preview: Option<FamilyMembers>,
    pub message: Option<String>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the "add more members" flow for a family the user already sees on
    /// the dashboard, bound to its current members.
    pub async fn add_to_family<A>(api: &A, family_id: &str) -> Result<Self, WizardError>
    where
        A: RecordStoreApi + ?Sized,
    {
        let family = api.get_family_members(family_id).await?;
        let mut state = WizardState {
            registration_type: Some(RegistrationType::Family),
            ..Self::default()
        };
        state.bind_family(family);
        state.step = Step::FamilyPage;
        Ok(state)
    }

    /// Members that are not persisted yet.
    pub fn new_members(&self) -> Vec<MemberDetails> {
        self.family_members
            .iter()
            .filter(|m| !self.existing_member_ids.contains(&m.id))
            .cloned()
            .collect()
    }

    fn has_member_id(&self, id: &str) -> bool {
        self.existing_member_ids.contains(id) || self.family_members.iter().any(|m| m.id == id)
    }

    pub fn render(&self) -> Render {
        match (&self.step, &self.message) {
            (Step::Success, Some(message)) => Render::Done {
                message: message.clone(),
            },
            (step, _) => Render::Step(*step),
        }
    }

    fn bind_family(&mut self, family: FamilyMembers) {
        self.existing_member_ids = family.members.iter().map(|m| m.id.clone()).collect();
        self.family_id = Some(family.family_id);
        self.family_head = family.family_head;
        self.family_members = family.members;
        self.is_existing_family = true;
        self.candidates.clear();
    }
}
