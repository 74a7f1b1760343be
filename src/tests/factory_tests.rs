//! Factory registry tests

use super::*;
use crate::constants::DEFAULT_MAX_SUPPLY_LIMIT;
use crate::{BondError, BondEvent, EventSink, Factory};

#[cfg(test)]
mod token_creation_tests {
    use super::*;

    const FACTORY: Address = Address::new([0xfa; 20]);

    fn factory() -> (Factory, Arc<InMemoryEventLog>) {
        init_tracing();
        let events = Arc::new(InMemoryEventLog::new());
        let sink: Arc<dyn EventSink> = events.clone();
        (Factory::new(FACTORY, DEFAULT_MAX_SUPPLY_LIMIT, sink), events)
    }

    #[test]
    fn test_create_token_registers_and_initializes() {
        let (factory, events) = factory();
        let token = factory.create_token("New Token", "NEW", units(1_000)).unwrap();

        assert!(factory.exists(&token));
        assert_eq!(factory.token_count(), 1);
        assert_eq!(factory.tokens(0), Some(token));
        assert_eq!(factory.max_supply(&token).unwrap(), units(1_000));

        let handle = factory.token(&token).unwrap();
        let ledger = handle.lock();
        assert_eq!(ledger.name(), "New Token");
        assert_eq!(ledger.symbol(), "NEW");
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.total_supply(), 0);
        assert_eq!(ledger.owner(), FACTORY);

        assert_eq!(
            events.events(),
            vec![BondEvent::TokenCreated {
                token_address: token,
                name: "New Token".to_string(),
                symbol: "NEW".to_string(),
                max_supply: units(1_000),
            }]
        );
    }

    #[test]
    fn test_created_token_cannot_be_reinitialized() {
        let (factory, _) = factory();
        let token = factory.create_token("New Token", "NEW", units(1)).unwrap();
        let handle = factory.token(&token).unwrap();
        assert_eq!(
            handle.lock().initialize("Hijack", "HJK"),
            Err(BondError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_addresses_are_unique_and_ordered() {
        let (factory, _) = factory();
        let first = factory.create_token("One", "ONE", units(1)).unwrap();
        let second = factory.create_token("Two", "TWO", units(2)).unwrap();
        let third = factory.create_token("Three", "THR", units(3)).unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(factory.tokens(1), Some(second));
        assert_eq!(factory.tokens(3), None);

        let page = factory.token_list(1, 10);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].address, second);
        assert_eq!(page[0].index, 1);
        assert_eq!(page[1].symbol, "THR");
        assert!(factory.token_list(5, 10).is_empty());
    }

    #[test]
    fn test_max_supply_limit() {
        let (factory, events) = factory();
        assert!(factory
            .create_token("Cap", "CAP", DEFAULT_MAX_SUPPLY_LIMIT)
            .is_ok());
        assert_eq!(
            factory.create_token("Over", "OVR", DEFAULT_MAX_SUPPLY_LIMIT + 1),
            Err(BondError::MaxSupplyLimitExceeded {
                requested: DEFAULT_MAX_SUPPLY_LIMIT + 1,
                limit: DEFAULT_MAX_SUPPLY_LIMIT,
            })
        );
        assert_eq!(factory.token_count(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_invalid_launch_params() {
        let (factory, events) = factory();
        assert!(factory.create_token("", "SYM", units(1)).is_err());
        assert!(factory.create_token("Name", "", units(1)).is_err());
        assert!(factory.create_token(&"x".repeat(65), "SYM", units(1)).is_err());
        assert!(factory.create_token("Name", "SYM", 0).is_err());
        assert_eq!(factory.token_count(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_token_lookups() {
        let (factory, _) = factory();
        let unknown = Address::from_low_u64(404);
        assert!(!factory.exists(&unknown));
        assert_eq!(factory.max_supply(&unknown), Err(BondError::TokenNotFound(unknown)));
        assert!(factory.token(&unknown).is_err());
    }

    #[test]
    fn test_token_info_serializes() {
        let (factory, _) = factory();
        let token = factory.create_token("New Token", "NEW", units(1)).unwrap();
        let info = factory.token_info(&token).unwrap();
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains(&token.to_string()));
        assert!(json.contains("\"symbol\":\"NEW\""));
    }
}
