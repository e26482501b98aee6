use std::collections::BTreeSet;

use shared::domain::{next_status, Action, Address, Agreement};

/// Computes the set of actions `acting` may currently request for
/// `agreement`: the lifecycle transition table intersected with the actor's
/// role on the record. Strangers and terminal-state agreements always get
/// the empty set.
///
/// This mirrors the contract's own gating so the UI never offers an action
/// the contract would reject, but it is advisory only; the contract remains
/// the final arbiter.
pub fn legal_actions(agreement: &Agreement, acting: &Address) -> BTreeSet<Action> {
    let Some(role) = agreement.role_of(acting) else {
        return BTreeSet::new();
    };

    Action::ALL
        .into_iter()
        .filter(|action| action.required_role() == role)
        .filter(|action| next_status(agreement.status, *action).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use shared::{
        amount::MicroStx,
        domain::{AgreementId, AgreementStatus},
    };

    use super::*;

    const BUYER: &str = "SP_BUYER";
    const VENDOR: &str = "SP_VENDOR";
    const STRANGER: &str = "SP_STRANGER";

    fn agreement(status: AgreementStatus) -> Agreement {
        Agreement {
            id: AgreementId(1),
            vendor: Address::new(VENDOR),
            buyer: Address::new(BUYER),
            amount: MicroStx(1_000_000),
            description: "work".into(),
            status,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn actions(status: AgreementStatus, address: &str) -> BTreeSet<Action> {
        legal_actions(&agreement(status), &Address::new(address))
    }

    #[test]
    fn buyer_follows_the_lifecycle_table() {
        assert_eq!(
            actions(AgreementStatus::Pending, BUYER),
            BTreeSet::from([Action::Fund])
        );
        assert_eq!(
            actions(AgreementStatus::Funded, BUYER),
            BTreeSet::from([Action::Accept])
        );
        assert_eq!(
            actions(AgreementStatus::Accepted, BUYER),
            BTreeSet::from([Action::Complete, Action::Dispute])
        );
    }

    #[test]
    fn disputed_waits_for_external_resolution() {
        assert!(actions(AgreementStatus::Disputed, BUYER).is_empty());
        assert!(actions(AgreementStatus::Disputed, VENDOR).is_empty());
    }

    #[test]
    fn terminal_states_offer_nothing() {
        for status in [AgreementStatus::Completed, AgreementStatus::Refunded] {
            assert!(actions(status, BUYER).is_empty());
            assert!(actions(status, VENDOR).is_empty());
        }
    }

    #[test]
    fn vendor_has_no_requestable_actions() {
        for status in [
            AgreementStatus::Pending,
            AgreementStatus::Funded,
            AgreementStatus::Accepted,
            AgreementStatus::Completed,
            AgreementStatus::Disputed,
            AgreementStatus::Refunded,
        ] {
            assert!(actions(status, VENDOR).is_empty());
        }
    }

    #[test]
    fn strangers_always_get_the_empty_set() {
        for status in [
            AgreementStatus::Pending,
            AgreementStatus::Funded,
            AgreementStatus::Accepted,
            AgreementStatus::Completed,
            AgreementStatus::Disputed,
            AgreementStatus::Refunded,
        ] {
            assert!(actions(status, STRANGER).is_empty());
        }
    }

    #[test]
    fn address_comparison_is_case_sensitive() {
        assert!(actions(AgreementStatus::Pending, "sp_buyer").is_empty());
    }
}
