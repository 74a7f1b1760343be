//! Escrow forwarder tests

use super::*;
use crate::{BondError, Forwarder, ForwarderConfig};

const FORWARDER: Address = Address::new([0xf0; 20]);
const REQUESTER: Address = ALICE;
const OWNER: Address = CAROL;

fn setup() -> (Forwarder, TokenHandle) {
    init_tracing();
    let minter = Authority::new(DEPLOYER);
    let mut token = Token::new(Address::from_low_u64(0xe1), &minter);
    token.initialize("Elon Musk", "elonmusk").unwrap();
    token.mint(&minter, &REQUESTER, units(1_000)).unwrap();
    (
        Forwarder::new(FORWARDER, DEPLOYER, ForwarderConfig::default()),
        token.into_handle(),
    )
}

/// Requester approved the forwarder and deposited 100
fn setup_with_request() -> (Forwarder, TokenHandle) {
    let (forwarder, token) = setup();
    token
        .lock()
        .approve(&REQUESTER, &FORWARDER, Amount::MAX)
        .unwrap();
    forwarder.request(&REQUESTER, &token, units(100)).unwrap();
    (forwarder, token)
}

fn balance(token: &TokenHandle, who: &Address) -> Amount {
    token.lock().balance_of(who)
}

#[cfg(test)]
mod admin_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let (forwarder, token) = setup();
        let address = token.lock().address();
        assert_eq!(forwarder.token_owner(&address), Address::ZERO);
        assert_eq!(forwarder.fund_address(), Address::ZERO);
        assert_eq!(forwarder.fee_rate(), 500);
    }

    #[test]
    fn test_admin_updates() {
        let (forwarder, token) = setup();
        let address = token.lock().address();

        forwarder.update_token_owner(&DEPLOYER, &address, OWNER).unwrap();
        assert_eq!(forwarder.token_owner(&address), OWNER);

        forwarder.update_fee(&DEPLOYER, DEPLOYER, 3_000).unwrap();
        assert_eq!(forwarder.fund_address(), DEPLOYER);
        assert_eq!(forwarder.fee_rate(), 3_000);

        assert!(matches!(
            forwarder.update_fee(&DEPLOYER, DEPLOYER, 10_001),
            Err(BondError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_non_admin_rejected() {
        let (forwarder, token) = setup();
        let address = token.lock().address();
        assert_eq!(
            forwarder.update_fee(&REQUESTER, DEPLOYER, 3_000),
            Err(BondError::PermissionDenied(REQUESTER))
        );
        assert_eq!(
            forwarder.update_token_owner(&REQUESTER, &address, OWNER),
            Err(BondError::PermissionDenied(REQUESTER))
        );
        assert_eq!(forwarder.fee_rate(), 500);
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn test_request_moves_into_custody() {
        let (forwarder, token) = setup_with_request();
        let address = token.lock().address();
        assert_eq!(balance(&token, &REQUESTER), units(900));
        assert_eq!(balance(&token, &FORWARDER), units(100));
        assert_eq!(forwarder.requested(&address, &REQUESTER), units(100));
    }

    #[test]
    fn test_request_without_approval() {
        let (forwarder, token) = setup();
        assert!(matches!(
            forwarder.request(&REQUESTER, &token, units(1)),
            Err(BondError::InsufficientAllowance { .. })
        ));
        assert_eq!(balance(&token, &REQUESTER), units(1_000));
    }

    #[test]
    fn test_refund() {
        let (forwarder, token) = setup_with_request();
        forwarder.refund(&REQUESTER, &token, units(50)).unwrap();
        assert_eq!(balance(&token, &REQUESTER), units(950));
        assert_eq!(balance(&token, &FORWARDER), units(50));
    }

    #[test]
    fn test_refund_over_limit() {
        let (forwarder, token) = setup_with_request();
        assert_eq!(
            forwarder.refund(&REQUESTER, &token, units(101)),
            Err(BondError::AmountLimitExceeded {
                outstanding: units(100),
                requested: units(101)
            })
        );
        forwarder.refund(&REQUESTER, &token, units(60)).unwrap();
        assert!(forwarder.refund(&REQUESTER, &token, units(41)).is_err());
    }

    #[test]
    fn test_refund_by_other_account() {
        let (forwarder, token) = setup_with_request();
        assert!(matches!(
            forwarder.refund(&DEPLOYER, &token, units(50)),
            Err(BondError::AmountLimitExceeded { .. })
        ));
        assert_eq!(balance(&token, &FORWARDER), units(100));
    }

    #[test]
    fn test_custody_cannot_be_spent_by_address() {
        let (forwarder, token) = setup_with_request();
        let mut ledger = token.lock();
        assert!(ledger.is_guarded(&FORWARDER));
        assert_eq!(
            ledger.transfer(&FORWARDER, &CAROL, units(100)),
            Err(BondError::PermissionDenied(FORWARDER))
        );
        assert_eq!(
            ledger.transfer_from(&FORWARDER, &REQUESTER, &CAROL, units(1)),
            Err(BondError::PermissionDenied(FORWARDER))
        );
        assert_eq!(ledger.balance_of(&CAROL), 0);
        drop(ledger);

        forwarder.refund(&REQUESTER, &token, units(100)).unwrap();
        assert_eq!(balance(&token, &REQUESTER), units(1_000));
    }
}

#[cfg(test)]
mod accept_tests {
    use super::*;

    fn configured() -> (Forwarder, TokenHandle, Address) {
        let (forwarder, token) = setup_with_request();
        let address = token.lock().address();
        forwarder.update_fee(&DEPLOYER, DEPLOYER, 1_000).unwrap();
        forwarder.update_token_owner(&DEPLOYER, &address, OWNER).unwrap();
        (forwarder, token, address)
    }

    #[test]
    fn test_accept_pays_owner_minus_fee() {
        let (forwarder, token, address) = configured();
        forwarder.accept(&OWNER, &token, &REQUESTER, units(100)).unwrap();

        assert_eq!(balance(&token, &OWNER), units(90));
        assert_eq!(balance(&token, &DEPLOYER), units(10));
        assert_eq!(balance(&token, &FORWARDER), 0);
        assert_eq!(forwarder.requested(&address, &REQUESTER), 0);
        assert!(forwarder.refund(&REQUESTER, &token, 1).is_err());
    }

    #[test]
    fn test_accept_with_zero_fee() {
        let (forwarder, token, _) = configured();
        forwarder.update_fee(&DEPLOYER, DEPLOYER, 0).unwrap();
        forwarder.accept(&OWNER, &token, &REQUESTER, units(100)).unwrap();

        assert_eq!(balance(&token, &OWNER), units(100));
        assert_eq!(balance(&token, &DEPLOYER), 0);
        assert_eq!(balance(&token, &FORWARDER), 0);
    }

    #[test]
    fn test_accept_by_non_owner() {
        let (forwarder, token, _) = configured();
        assert_eq!(
            forwarder.accept(&DEPLOYER, &token, &REQUESTER, units(100)),
            Err(BondError::PermissionDenied(DEPLOYER))
        );
        assert_eq!(balance(&token, &FORWARDER), units(100));
    }

    #[test]
    fn test_accept_over_request() {
        let (forwarder, token, _) = configured();
        assert!(matches!(
            forwarder.accept(&OWNER, &token, &REQUESTER, units(101)),
            Err(BondError::AmountLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_fee_without_fund_address_rejected() {
        let (forwarder, token) = setup_with_request();
        let address = token.lock().address();
        forwarder.update_token_owner(&DEPLOYER, &address, OWNER).unwrap();

        assert!(matches!(
            forwarder.accept(&OWNER, &token, &REQUESTER, units(100)),
            Err(BondError::InvalidParameters(_))
        ));
        assert_eq!(balance(&token, &FORWARDER), units(100));
        assert_eq!(forwarder.requested(&address, &REQUESTER), units(100));
    }
}
