use proptest::prelude::*;
use jsonify::script::grammar::split_args;
use jsonify::types::DataType;
use jsonify::Value;

/// One top-level argument whose text may itself contain commas.
fn arg_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9_]{0,6}",
        "[a-z ,]{0,8}".prop_map(|s| format!("\"{s}\"")),
        "[a-z ,]{0,8}".prop_map(|s| format!("'{s}'")),
        prop::collection::vec(0..1000i32, 0..4).prop_map(|xs| {
            let parts: Vec<String> = xs.iter().map(i32::to_string).collect();
            format!("[{}]", parts.join(", "))
        }),
        ("[a-z]{1,4}", prop::collection::vec("[a-z]{1,3}", 0..3))
            .prop_map(|(name, args)| format!("{name}({})", args.join(", "))),
        ("[a-z]{1,4}", "[a-z ,]{0,5}").prop_map(|(k, v)| format!("{{{k}: \"{v}\"}}")),
    ]
}

proptest! {
    /// Nested commas never split a top-level argument.
    #[test]
    fn split_count_matches_argument_count(args in prop::collection::vec(arg_text(), 1..6)) {
        let line = args.join(", ");
        let parts = split_args(&line).unwrap();
        prop_assert_eq!(parts.len(), args.len());
    }

    /// Splitting arbitrary text returns Ok or Err but never panics.
    #[test]
    fn split_does_not_panic(s in "\\PC*") {
        let _ = split_args(&s);
    }
}

proptest! {
    #[test]
    fn integers_are_fixed_points(n in any::<i64>()) {
        let v = Value::Int(i128::from(n));
        prop_assert_eq!(DataType::Integer.convert(v.clone()).unwrap(), v);
    }

    #[test]
    fn strings_are_fixed_points(s in "\\PC*") {
        let v = Value::Str(s);
        prop_assert_eq!(DataType::String.convert(v.clone()).unwrap(), v);
    }

    #[test]
    fn floats_are_fixed_points(x in -1e12f64..1e12) {
        let v = Value::Float(x);
        prop_assert_eq!(DataType::Float.convert(v.clone()).unwrap(), v);
    }

    #[test]
    fn integer_lists_are_fixed_points(xs in prop::collection::vec(any::<i32>(), 0..8)) {
        let v = Value::List(xs.into_iter().map(|x| Value::Int(i128::from(x))).collect());
        let t = DataType::parse("List[Integer]").unwrap();
        prop_assert_eq!(t.convert(v.clone()).unwrap(), v);
    }

    /// Wraparound is stable under repeated conversion.
    #[test]
    fn fixed_width_is_idempotent(
        n in any::<i64>(),
        bits in prop::sample::select(vec![8u32, 16, 32, 64]),
        signed in any::<bool>(),
    ) {
        let t = DataType::Fixed { bits, signed };
        let once = t.convert(Value::Int(i128::from(n))).unwrap();
        let twice = t.convert(once.clone()).unwrap();
        prop_assert_eq!(&twice, &once);
        let Value::Int(w) = once else { panic!("expected an integer") };
        if signed {
            prop_assert!(w >= -(1i128 << (bits - 1)) && w < (1i128 << (bits - 1)));
        } else {
            prop_assert!(w >= 0 && w < (1i128 << bits));
        }
    }

    #[test]
    fn reduced_floats_are_idempotent(x in -60000f64..60000.0) {
        for name in ["Float16", "Float32"] {
            let t = DataType::parse(name).unwrap();
            let once = t.convert(Value::Float(x)).unwrap();
            prop_assert_eq!(t.convert(once.clone()).unwrap(), once);
        }
    }
}
