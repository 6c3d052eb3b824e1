use log::{info, warn};
use std::collections::BTreeSet;
use chrono::{Duration, Utc};
use retreat_shared::ids::{self, generate_family_id, generate_individual_id, generate_member_id};
use retreat_shared::models::MemberDetails;

use super::{ContactForm, RegistrationType, Render, Step, WizardError, WizardEvent, WizardState};
use crate::api::{FamilySubmission, RecordStoreApi};
use crate::error::ClientError;

type Transition = Result<WizardState, WizardError>;

const MAX_ID_ATTEMPTS: usize = 50;

/// Applies `event` to `state`. A failed event leaves the state as it was and
/// re-renders the same step with the error. The one exception is a submission the
/// store rejects as a conflict: the generated ids it used are replaced, so the
/// next attempt does not collide again.
pub async fn advance<A>(api: &A, state: WizardState, event: WizardEvent) -> (WizardState, Render)
where
    A: RecordStoreApi + ?Sized,
{
    match transition(api, &state, event).await {
        Ok(next) => {
            let render = next.render();
            (next, render)
        }
        Err(error) => {
            warn!("Wizard stays on {}: {}", state.step, error);
            let mut state = state;
            if matches!(error, WizardError::Api(ClientError::Conflict(_))) {
                replace_generated_ids(&mut state);
            }
            let render = Render::Error {
                step: state.step,
                error,
            };
            (state, render)
        }
    }
}

async fn transition<A>(api: &A, state: &WizardState, event: WizardEvent) -> Transition
where
    A: RecordStoreApi + ?Sized,
{
    let invalid = |event: &WizardEvent| WizardError::InvalidTransition {
        step: state.step,
        event: event.name(),
    };

    match (state.step, event) {
        (_, WizardEvent::StartOver) => Ok(WizardState::new()),
        (_, WizardEvent::Back) => back(state),

        (Step::SelectType, WizardEvent::ChooseIndividual) => Ok(WizardState {
            step: Step::IndividualName,
            registration_type: Some(RegistrationType::Individual),
            ..state.clone()
        }),
        (Step::SelectType, WizardEvent::ChooseFamily) => Ok(WizardState {
            step: Step::FamilyCheck,
            registration_type: Some(RegistrationType::Family),
            ..state.clone()
        }),

        (Step::IndividualName, WizardEvent::EnterName { name }) => {
            let name = required_name(&name)?;
            // Keep the id stable while the name is unchanged
            let individual_id = match &state.individual_id {
                Some(id) if state.individual_name == name => id.clone(),
                _ => generate_individual_id(&name),
            };
            Ok(WizardState {
                step: Step::IndividualForm,
                individual_id: Some(individual_id),
                individual_name: name,
                ..state.clone()
            })
        }
        (Step::IndividualForm, WizardEvent::SubmitIndividual(contact)) => {
            submit_individual(api, state, contact).await
        }

        (Step::FamilyCheck, WizardEvent::NewFamily) => Ok(WizardState {
            step: Step::FamilyNew,
            ..state.clone()
        }),
        (Step::FamilyCheck, WizardEvent::ExistingFamily) => Ok(WizardState {
            step: Step::FamilySearch,
            ..state.clone()
        }),

        (Step::FamilyNew, WizardEvent::CreateFamily { head_name }) => {
            let head = required_name(&head_name)?;
            let mut next = state.clone();
            next.family_id = match &state.family_id {
                Some(id) if !state.is_existing_family && state.family_head == head => {
                    Some(id.clone())
                }
                _ => Some(generate_family_id(&head)),
            };
            // Switching away from a searched family drops its members
            if state.is_existing_family {
                next.family_members.clear();
                next.existing_member_ids.clear();
                next.preview = None;
            }
            next.family_head = head;
            next.is_existing_family = false;
            next.step = Step::FamilyPage;
            Ok(next)
        }

        (Step::FamilySearch, WizardEvent::Search { query }) => search(api, state, &query).await,
        (Step::FamilySelect, WizardEvent::SelectFamily { family_id }) => {
            let family = state
                .candidates
                .iter()
                .find(|c| c.family_id == family_id)
                .cloned()
                .ok_or(WizardError::UnknownCandidate(family_id))?;
            Ok(WizardState {
                step: Step::FamilyConfirm,
                preview: Some(family),
                ..state.clone()
            })
        }
        (Step::FamilyConfirm, WizardEvent::ConfirmFamily) => {
            let mut next = state.clone();
            if let Some(family) = state.preview.clone() {
                next.bind_family(family);
            }
            next.step = Step::FamilyPage;
            Ok(next)
        }

        (Step::FamilyPage, WizardEvent::AddMember { name, contact }) => {
            let name = required_name(&name)?;
            let id = unused_id(|_| generate_member_id(&name), |id| state.has_member_id(id));
            let member = member_details(id, name, contact)?;
            let mut next = state.clone();
            next.family_members.push(member);
            Ok(next)
        }
        (Step::FamilyPage, WizardEvent::RemoveMember { id }) => {
            if state.existing_member_ids.contains(&id) {
                return Err(WizardError::CannotRemovePersisted(id));
            }
            let mut next = state.clone();
            let before = next.family_members.len();
            next.family_members.retain(|m| m.id != id);
            if next.family_members.len() == before {
                return Err(WizardError::UnknownMember(id));
            }
            Ok(next)
        }
        (Step::FamilyPage, WizardEvent::Complete) => complete_family(api, state).await,

        (_, event) => Err(invalid(&event)),
    }
}

fn back(state: &WizardState) -> Transition {
    let previous = match state.step {
        Step::SelectType => None,
        Step::IndividualName | Step::FamilyCheck => Some(Step::SelectType),
        Step::IndividualForm => Some(Step::IndividualName),
        Step::FamilyNew | Step::FamilySearch => Some(Step::FamilyCheck),
        Step::FamilySelect => Some(Step::FamilySearch),
        Step::FamilyConfirm if state.candidates.is_empty() => Some(Step::FamilySearch),
        Step::FamilyConfirm => Some(Step::FamilySelect),
        Step::FamilyPage if !state.is_existing_family => Some(Step::FamilyNew),
        Step::FamilyPage if state.preview.is_some() => Some(Step::FamilyConfirm),
        // Entered from the dashboard or after submitting; there is nothing before it
        Step::FamilyPage => None,
        Step::Success if state.registration_type == Some(RegistrationType::Family) => {
            Some(Step::FamilyPage)
        }
        Step::Success => None,
    };

    let Some(previous) = previous else {
        return Err(WizardError::InvalidTransition {
            step: state.step,
            event: WizardEvent::Back.name(),
        });
    };

    let mut next = state.clone();
    next.step = previous;
    next.message = None;
    if previous == Step::FamilySearch {
        next.preview = None;
        next.candidates.clear();
    }
    Ok(next)
}

/// Draws ids until one is not `taken`, giving up after a bounded number of tries.
/// `generate` gets the attempt number.
fn unused_id(generate: impl Fn(usize) -> String, taken: impl Fn(&str) -> bool) -> String {
    let mut id = generate(0);
    for attempt in 1..MAX_ID_ATTEMPTS {
        if !taken(&id) {
            break;
        }
        id = generate(attempt);
    }
    id
}

fn replace_generated_ids(state: &mut WizardState) {
    match state.step {
        Step::IndividualForm => {
            let rejected = state.individual_id.take();
            let name = state.individual_name.clone();
            let id = unused_id(
                |_| generate_individual_id(&name),
                |id| rejected.as_deref() == Some(id),
            );
            info!("Replacing individual id {:?} with {}", rejected, id);
            state.individual_id = Some(id);
        }
        Step::FamilyPage => {
            if !state.is_existing_family {
                let rejected = state.family_id.take();
                let head = state.family_head.clone();
                // Family ids follow the clock, so later attempts look further ahead
                let id = unused_id(
                    |attempt| {
                        ids::family_id(&head, Utc::now() + Duration::milliseconds(attempt as i64))
                    },
                    |id| rejected.as_deref() == Some(id),
                );
                info!("Replacing family id {:?} with {}", rejected, id);
                state.family_id = Some(id);
            }

            let mut taken: BTreeSet<String> = state
                .family_members
                .iter()
                .map(|m| m.id.clone())
                .chain(state.existing_member_ids.iter().cloned())
                .collect();
            for member in state.family_members.iter_mut() {
                if state.existing_member_ids.contains(&member.id) {
                    continue;
                }
                let name = member.name.clone();
                let id = unused_id(|_| generate_member_id(&name), |id| taken.contains(id));
                taken.insert(id.clone());
                member.id = id;
            }
        }
        _ => {}
    }
}

fn required_name(name: &str) -> Result<String, WizardError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WizardError::MissingFields(vec!["name"]));
    }
    Ok(name.to_string())
}

fn member_details(id: String, name: String, contact: ContactForm) -> Result<MemberDetails, WizardError> {
    let details = MemberDetails {
        id,
        name,
        phone: contact.phone.trim().to_string(),
        email: contact.email.trim().to_string(),
        address: contact.address.trim().to_string(),
    };
    let missing = details.missing_fields();
    if !missing.is_empty() {
        return Err(WizardError::MissingFields(missing));
    }
    Ok(details)
}

async fn submit_individual<A>(api: &A, state: &WizardState, contact: ContactForm) -> Transition
where
    A: RecordStoreApi + ?Sized,
{
    let id = state
        .individual_id
        .clone()
        .unwrap_or_else(|| generate_individual_id(&state.individual_name));
    let details = member_details(id, state.individual_name.clone(), contact)?;

    let id = api.submit_individual(&details).await?;
    info!("Individual registration {} submitted", id);

    Ok(WizardState {
        step: Step::Success,
        individual_id: Some(id.clone()),
        message: Some(format!("Registration complete! Your registration ID is {}.", id)),
        ..state.clone()
    })
}

async fn search<A>(api: &A, state: &WizardState, query: &str) -> Transition
where
    A: RecordStoreApi + ?Sized,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(WizardError::MissingFields(vec!["family ID or email"]));
    }

    let mut families = if query.contains('@') {
        api.search_family_by_email(query).await?
    } else {
        vec![api.get_family_members(&query.to_uppercase()).await?]
    };

    let mut next = state.clone();
    if families.len() == 1 {
        next.step = Step::FamilyConfirm;
        next.preview = families.pop();
        next.candidates.clear();
    } else {
        info!("{} families match {}", families.len(), query);
        next.step = Step::FamilySelect;
        next.preview = None;
        next.candidates = families;
    }
    Ok(next)
}

async fn complete_family<A>(api: &A, state: &WizardState) -> Transition
where
    A: RecordStoreApi + ?Sized,
{
    let new_members = state.new_members();
    if new_members.is_empty() {
        return Err(WizardError::NothingToSubmit);
    }

    let family_id = state
        .family_id
        .clone()
        .unwrap_or_else(|| generate_family_id(&state.family_head));

    let receipt = api
        .submit_family(&FamilySubmission {
            family_id,
            family_head: state.family_head.clone(),
            members: new_members.clone(),
            is_existing: state.is_existing_family,
        })
        .await?;

    let message = if receipt.created {
        format!(
            "Family {} registered with {} member(s).",
            receipt.family_id, receipt.member_count
        )
    } else {
        format!(
            "{} member(s) added to family {}.",
            receipt.added_count, receipt.family_id
        )
    };
    info!("{}", message);

    let mut next = state.clone();
    next.existing_member_ids
        .extend(new_members.into_iter().map(|m| m.id));
    next.family_id = Some(receipt.family_id);
    next.is_existing_family = true;
    next.preview = None;
    next.step = Step::Success;
    next.message = Some(message);
    Ok(next)
}
