//! Property tests for MON/wei conversion and path labels

use ethers::types::U256;
use monkabreak_client::{parse_amount, path_to_string, to_decimal_string, Amount, PathChoice};
use proptest::prelude::*;

fn any_u256() -> impl Strategy<Value = U256> {
    any::<[u64; 4]>().prop_map(U256)
}

proptest! {
    #[test]
    fn display_form_parses_back_to_same_wei(wei in any_u256()) {
        let shown = to_decimal_string(wei);
        prop_assert_eq!(parse_amount(&shown).unwrap(), wei);
    }

    #[test]
    fn whole_and_fractional_parts_compose(
        whole in 0u64..1_000_000,
        frac in 0u64..1_000_000_000_000_000_000
    ) {
        let input = format!("{whole}.{frac:018}");
        let expected = U256::from(whole) * U256::exp10(18) + U256::from(frac);
        prop_assert_eq!(Amount::parse(&input).unwrap().wei(), expected);
    }

    #[test]
    fn ordering_follows_wei(a in any::<u128>(), b in any::<u128>()) {
        let (x, y) = (Amount::from_wei(a), Amount::from_wei(b));
        prop_assert_eq!(x.cmp(&y), a.cmp(&b));
    }

    #[test]
    fn path_labels_cover_every_index(index in any::<u64>()) {
        let label = path_to_string(index);
        match PathChoice::try_from(u8::try_from(index).unwrap_or(u8::MAX)) {
            Ok(path) if index < 3 => prop_assert_eq!(label, path.to_string()),
            _ => prop_assert_eq!(label, "Unknown"),
        }
    }
}

#[test]
fn rejects_more_precision_than_wei() {
    assert!(parse_amount("0.0000000000000000001").is_err());
    assert_eq!(parse_amount("0.000000000000000001").unwrap(), U256::one());
}
