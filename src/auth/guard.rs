//! Ownership and moderation rules shared by the agency and listing handlers.

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Agency, TransactionType, VehicleType};

/// May `actor` create, modify or delete listings owned by `agency`?
///
/// Admins bypass ownership and approval. An agent must own the agency, and the
/// agency must be approved. A listing under someone else's agency is reported
/// as missing so its existence is not leaked.
pub fn check_listing_mutation(actor: &AuthUser, agency: &Agency) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    actor.require_agent()?;
    if agency.owner_id != actor.user_id {
        return Err(AppError::NotFound("Listing not found".to_string()));
    }
    if !agency.is_approved() {
        return Err(AppError::Forbidden(
            "Agency must be approved before managing listings".to_string(),
        ));
    }
    Ok(())
}

/// Owner or admin may edit agency details regardless of moderation status.
pub fn check_agency_owner(actor: &AuthUser, agency: &Agency) -> Result<(), AppError> {
    if actor.is_admin() || agency.owner_id == actor.user_id {
        Ok(())
    } else {
        Err(AppError::NotFound("Agency not found".to_string()))
    }
}

/// Unapproved agencies are only visible to their owner and admins.
pub fn can_view_agency(actor: Option<&AuthUser>, agency: &Agency) -> bool {
    agency.is_approved()
        || actor.is_some_and(|a| a.is_admin() || a.user_id == agency.owner_id)
}

pub fn check_agency_handles(
    agency: &Agency,
    vehicle: VehicleType,
    transaction: TransactionType,
) -> Result<(), AppError> {
    if agency.handles(vehicle, transaction) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Agency does not list {} for {}",
            vehicle_label(vehicle),
            transaction_label(transaction)
        )))
    }
}

fn vehicle_label(vehicle: VehicleType) -> &'static str {
    match vehicle {
        VehicleType::Car => "cars",
        VehicleType::Motorcycle => "motorcycles",
    }
}

fn transaction_label(transaction: TransactionType) -> &'static str {
    match transaction {
        TransactionType::Sale => "sale",
        TransactionType::Rental => "rental",
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{AgencyStatus, Role};

    fn agency(owner_id: Uuid, status: AgencyStatus) -> Agency {
        Agency {
            id: Uuid::now_v7(),
            owner_id,
            name: "Dune Motors".to_string(),
            description: None,
            address: None,
            city: Some("Tunis".to_string()),
            phone: None,
            email: None,
            logo: None,
            status,
            rejection_reason: None,
            vehicle_types: vec![VehicleType::Car],
            transaction_types: vec![TransactionType::Sale, TransactionType::Rental],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn actor(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::now_v7(),
            role,
        }
    }

    #[test]
    fn owner_of_approved_agency_may_mutate() {
        let agent = actor(Role::Agent);
        let owned = agency(agent.user_id, AgencyStatus::Approved);
        assert!(check_listing_mutation(&agent, &owned).is_ok());
    }

    #[test]
    fn owner_of_pending_agency_is_forbidden() {
        let agent = actor(Role::Agent);
        for status in [AgencyStatus::Pending, AgencyStatus::Rejected] {
            let owned = agency(agent.user_id, status);
            assert!(matches!(
                check_listing_mutation(&agent, &owned),
                Err(AppError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn other_agents_listing_looks_missing() {
        let agent = actor(Role::Agent);
        let foreign = agency(Uuid::now_v7(), AgencyStatus::Approved);
        assert!(matches!(
            check_listing_mutation(&agent, &foreign),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn admin_bypasses_ownership_and_approval() {
        let admin = actor(Role::Admin);
        let foreign = agency(Uuid::now_v7(), AgencyStatus::Pending);
        assert!(check_listing_mutation(&admin, &foreign).is_ok());
    }

    #[test]
    fn plain_user_is_forbidden() {
        let user = actor(Role::User);
        let own_id_agency = agency(user.user_id, AgencyStatus::Approved);
        assert!(matches!(
            check_listing_mutation(&user, &own_id_agency),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn pending_agency_visibility() {
        let owner = actor(Role::Agent);
        let pending = agency(owner.user_id, AgencyStatus::Pending);
        assert!(can_view_agency(Some(&owner), &pending));
        assert!(can_view_agency(Some(&actor(Role::Admin)), &pending));
        assert!(!can_view_agency(Some(&actor(Role::User)), &pending));
        assert!(!can_view_agency(None, &pending));
    }

    #[test]
    fn declared_vehicle_types_are_enforced() {
        let a = agency(Uuid::now_v7(), AgencyStatus::Approved);
        assert!(check_agency_handles(&a, VehicleType::Car, TransactionType::Rental).is_ok());
        assert!(matches!(
            check_agency_handles(&a, VehicleType::Motorcycle, TransactionType::Sale),
            Err(AppError::BadRequest(_))
        ));
    }
}
