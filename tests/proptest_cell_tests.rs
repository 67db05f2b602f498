//! Property tests for cell invariants: the kind lock, index bounds, and
//! alias consistency hold for arbitrary inputs.

use proptest::prelude::*;
use tabula::{Datum, Error, Field, Value, ValueKind};

proptest! {
    #[test]
    fn prop_pushed_integers_read_back(values in prop::collection::vec(any::<i32>(), 1..32)) {
        let mut datum = Datum::new();
        for v in &values {
            datum.push(*v).unwrap();
        }
        prop_assert_eq!(datum.len(), values.len());
        for (i, v) in values.iter().enumerate() {
            prop_assert_eq!(datum.get_integer(i).unwrap(), *v);
        }
    }

    #[test]
    fn prop_kind_lock_survives_any_first_write(first in any::<i32>(), intruder in ".*") {
        let mut datum = Datum::new();
        datum.push(first).unwrap();

        let err = datum.push(intruder.as_str()).unwrap_err();
        prop_assert!(
            matches!(err, Error::TypeMismatch { .. }),
            "expected a kind mismatch, got {:?}",
            err
        );
        prop_assert_eq!(datum.kind(), Some(ValueKind::Integer));
        prop_assert_eq!(datum.len(), 1);
        prop_assert_eq!(datum.get_integer(0).unwrap(), first);
    }

    #[test]
    fn prop_out_of_range_reads_never_panic(len in 0usize..16, probe in 0usize..64) {
        let mut datum = Datum::new();
        for i in 0..len {
            datum.push(i as i32).unwrap();
        }
        match datum.get(probe) {
            Ok(Value::Integer(v)) => {
                prop_assert!(probe < len);
                prop_assert_eq!(v, probe as i32);
            }
            Err(Error::IndexOutOfRange { index, length }) => {
                prop_assert!(probe >= len);
                prop_assert_eq!(index, probe);
                prop_assert_eq!(length, len);
            }
            other => prop_assert!(false, "unexpected result: {:?}", other),
        }
    }

    #[test]
    fn prop_set_only_extends_by_one(len in 1usize..8, probe in 0usize..32) {
        let mut datum = Datum::new();
        for _ in 0..len {
            datum.push(0).unwrap();
        }
        let result = datum.set(7, probe);
        if probe <= len {
            prop_assert!(result.is_ok());
            prop_assert_eq!(datum.get_integer(probe).unwrap(), 7);
        } else {
            prop_assert!(
                matches!(result, Err(Error::IndexOutOfRange { .. })),
                "expected an out of range error, got {:?}",
                result
            );
            prop_assert_eq!(datum.len(), len);
        }
    }

    #[test]
    fn prop_alias_stays_consistent(values in prop::collection::vec(any::<f32>(), 1..8), writes in prop::collection::vec((0usize..8, any::<f32>()), 0..16)) {
        let field = Field::from_values(values.clone());
        let mut datum = Datum::new();
        datum.set_storage(field.external_slot()).unwrap();

        for (index, value) in writes {
            let in_range = index < values.len();
            let result = datum.set(value, index);
            prop_assert_eq!(result.is_ok(), in_range);
        }

        // whatever was written, both views agree element for element
        prop_assert_eq!(datum.len(), field.len());
        for i in 0..field.len() {
            let through_cell = datum.get_float(i).unwrap();
            let through_field = field.get(i).unwrap();
            prop_assert!(through_cell == through_field || (through_cell.is_nan() && through_field.is_nan()));
        }
    }
}
