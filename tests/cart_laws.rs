//! Property tests for cart contents and fingerprints

use atelier::carts::{
    CartContents, CartLine, MAX_QUANTITY, fingerprint::CartSigner,
};
use jiff::Timestamp;
use proptest::{prelude::*, test_runner::Config};
use uuid::Uuid;

fn line_strategy() -> impl Strategy<Value = CartLine> {
    (1_u128..500, 1_u32..=MAX_QUANTITY, 1_u64..1_000_000).prop_map(
        |(variant, quantity, unit_price)| CartLine {
            variant: Uuid::from_u128(variant),
            quantity,
            size: "M".to_string(),
            colour: "preto".to_string(),
            unit_price,
        },
    )
}

fn contents_strategy() -> impl Strategy<Value = CartContents> {
    prop::collection::vec(line_strategy(), 0..20).prop_map(|lines| {
        let mut contents = CartContents::new();

        for line in lines {
            // Lines that would overflow a quantity are simply skipped.
            let _ignored = contents.add(line);
        }

        contents
    })
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn add_then_remove_restores_hash(
        contents in contents_strategy(),
        quantity in 1_u32..=MAX_QUANTITY,
        unit_price in 1_u64..1_000_000,
    ) {
        let mut cart = contents.clone();
        let before = cart.content_hash();
        let variant = Uuid::from_u128(10_000);

        prop_assume!(cart.line(variant).is_none());
        prop_assume!(cart.len() < atelier::carts::MAX_LINES);

        cart.add(CartLine {
            variant,
            quantity,
            size: "G".to_string(),
            colour: "azul".to_string(),
            unit_price,
        }).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_ne!(cart.content_hash(), before.clone());

        cart.remove(variant).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(cart.content_hash(), before);
    }

    #[test]
    fn fingerprints_are_pure(contents in contents_strategy(), nonce in "[0-9a-f]{32}") {
        let signer = CartSigner::new(b"property-key".to_vec())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let cart = Uuid::from_u128(42);
        let at = Timestamp::from_second(1_700_000_000)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let copy = CartContents::from_lines(contents.lines().iter().rev().cloned())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let first = signer.issue_with_nonce(cart, &contents, &nonce, at)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = signer.issue_with_nonce(cart, &copy, &nonce, at)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(&first.signature, &second.signature);
        prop_assert!(signer.verify(cart, &copy, &first, Some(&second.signature)).is_ok());
    }

    #[test]
    fn quantities_stay_in_bounds(contents in contents_strategy(), other in contents_strategy()) {
        let mut merged = contents;

        merged.merge(&other);

        prop_assert!(merged.len() <= atelier::carts::MAX_LINES);
        prop_assert!(merged.lines().iter().all(|line| (1..=MAX_QUANTITY).contains(&line.quantity)));
    }
}
