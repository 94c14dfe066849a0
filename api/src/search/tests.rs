use super::builder::{build_order_by, build_where, SqlValue};
use super::compiler::{
    compile, compile_filter, page_window, parse_projection, parse_sort, CONTROL_KEYS,
    FREE_TEXT_FIELDS,
};
use super::params::RawQueryParams;
use super::types::*;

fn params(pairs: &[(&str, &str)]) -> RawQueryParams {
    RawQueryParams::from_pairs(pairs.iter().copied())
}

fn contains(field: &str, needle: &str) -> Predicate {
    Predicate::contains(field, needle)
}

// ============ Filter compilation ============

#[test]
fn test_control_keys_only_compile_to_empty_filter() {
    let query = compile(
        &params(&[
            ("page", "2"),
            ("limit", "5"),
            ("sort", "-price"),
            ("fields", "title"),
        ]),
        10,
    );
    assert_eq!(query.filter, Predicate::all());
    assert!(query.filter.matches_all());
}

#[test]
fn test_no_params_compile_to_defaults() {
    let query = compile(&RawQueryParams::default(), 10);
    assert!(query.filter.matches_all());
    assert_eq!(query.sort, None);
    assert_eq!(query.projection, None);
    assert_eq!(query.window, PageWindow::new(1, 10));
}

#[test]
fn test_title_and_category_become_contains() {
    let filter = compile_filter(&params(&[("title", "Shoe"), ("category", "foot")]));
    assert_eq!(
        filter,
        Predicate::And(vec![contains("category", "foot"), contains("title", "Shoe")])
    );
}

#[test]
fn test_color_list_expands_to_or_of_n_tokens() {
    let filter = compile_filter(&params(&[("color", "red,blue, green")]));
    assert_eq!(
        filter,
        Predicate::And(vec![Predicate::Or(vec![
            contains("color", "red"),
            contains("color", "blue"),
            contains("color", "green"),
        ])])
    );
    assert!(!filter.equality_fields().contains(&"color"));
}

#[test]
fn test_single_color_is_still_an_or() {
    let filter = compile_filter(&params(&[("color", "red")]));
    assert_eq!(
        filter.clauses(),
        [Predicate::Or(vec![contains("color", "red")])]
    );
}

#[test]
fn test_repeated_color_keys_are_flattened() {
    let filter = compile_filter(&params(&[("color", "red"), ("color", "blue,black")]));
    match filter.clauses() {
        [Predicate::Or(tokens)] => assert_eq!(tokens.len(), 3),
        other => panic!("Expected one OR clause, got {:?}", other),
    }
}

#[test]
fn test_empty_color_adds_no_clause() {
    let filter = compile_filter(&params(&[("color", " , ")]));
    assert!(filter.matches_all());
}

#[test]
fn test_free_text_fans_out_over_four_fields() {
    let filter = compile_filter(&params(&[("q", "red")]));
    assert_eq!(
        filter,
        Predicate::And(vec![Predicate::Or(vec![
            contains("color", "red"),
            contains("title", "red"),
            contains("category", "red"),
            contains("brand", "red"),
        ])])
    );
    assert!(filter.equality_fields().is_empty());
}

#[test]
fn test_free_text_and_color_are_both_applied() {
    let filter = compile_filter(&params(&[("q", "shoe"), ("color", "red,blue")]));
    let clauses = filter.clauses();
    assert_eq!(clauses.len(), 2);
    assert_eq!(
        clauses[0],
        Predicate::Or(vec![contains("color", "red"), contains("color", "blue")])
    );
    match &clauses[1] {
        Predicate::Or(matches) => assert_eq!(matches.len(), FREE_TEXT_FIELDS.len()),
        other => panic!("Expected free-text OR, got {:?}", other),
    }
}

#[test]
fn test_clause_set_does_not_depend_on_parameter_order() {
    let a = compile_filter(&params(&[("q", "x"), ("brand", "acme"), ("color", "red")]));
    let b = compile_filter(&params(&[("color", "red"), ("brand", "acme"), ("q", "x")]));
    assert_eq!(a, b);
}

#[test]
fn test_range_operators_become_one_range_leaf() {
    let filter = compile_filter(&params(&[("price[gt]", "10"), ("price[lt]", "100")]));
    assert_eq!(
        filter,
        Predicate::And(vec![Predicate::Range {
            field: "price".to_string(),
            bounds: vec![
                Bound {
                    op: Comparator::Gt,
                    value: Value::new("10")
                },
                Bound {
                    op: Comparator::Lt,
                    value: Value::new("100")
                },
            ],
        }])
    );
}

#[test]
fn test_range_and_equality_on_same_field_share_one_clause() {
    let filter = compile_filter(&params(&[("quantity", "3"), ("quantity[gte]", "1")]));
    match filter.clauses() {
        [Predicate::And(conditions)] => assert_eq!(conditions.len(), 2),
        other => panic!("Expected one per-field clause, got {:?}", other),
    }
}

#[test]
fn test_operator_rewrite_leaves_values_alone() {
    let filter = compile_filter(&params(&[("title", "gt"), ("brand", "lte")]));
    assert_eq!(
        filter,
        Predicate::And(vec![
            Predicate::Equals {
                field: "brand".to_string(),
                value: Value::new("lte")
            },
            contains("title", "gt"),
        ])
    );
}

#[test]
fn test_unknown_operator_key_is_kept_literally() {
    let filter = compile_filter(&params(&[("price[ne]", "5")]));
    assert_eq!(filter.equality_fields(), vec!["price[ne]"]);
}

#[test]
fn test_other_fields_compile_to_equality() {
    let filter = compile_filter(&params(&[("brand", "Acme"), ("price", "19.5")]));
    assert_eq!(
        filter,
        Predicate::And(vec![
            Predicate::Equals {
                field: "brand".to_string(),
                value: Value::new("Acme")
            },
            Predicate::Equals {
                field: "price".to_string(),
                value: Value::new("19.5")
            },
        ])
    );
}

#[test]
fn test_control_keys_never_reach_the_filter() {
    let filter = compile_filter(&params(&[
        ("page", "1"),
        ("brand", "Acme"),
        ("limit", "3"),
        ("sort", "title"),
        ("fields", "title"),
    ]));
    let fields = filter.equality_fields();
    for key in CONTROL_KEYS {
        assert!(!fields.contains(&key), "{} leaked into the filter", key);
    }
    assert_eq!(fields, vec!["brand"]);
}

#[test]
fn test_control_keys_with_operators_never_reach_the_filter() {
    let filter = compile_filter(&params(&[
        ("page[gt]", "1"),
        ("limit[lt]", "5"),
        ("sort[gte]", "2"),
        ("brand", "Acme"),
    ]));
    assert_eq!(
        filter,
        Predicate::And(vec![Predicate::Equals {
            field: "brand".to_string(),
            value: Value::new("Acme")
        }])
    );

    let query = compile(&params(&[("page[gt]", "3"), ("limit[lt]", "5")]), 10);
    assert!(query.filter.matches_all());
    assert_eq!(query.window, PageWindow::new(1, 10));
}

#[test]
fn test_value_keeps_raw_text() {
    assert_eq!(Value::new(" 007").raw, " 007");
    assert_eq!(Value::new("42").as_integer(), Some(42));
    assert_eq!(Value::new("2.5").as_integer(), None);
    assert_eq!(Value::new("2.5").as_number(), Some(2.5));
    assert_eq!(Value::new("1e3").as_number(), Some(1000.0));
    assert_eq!(Value::new("inf").as_number(), None);
    assert_eq!(Value::new("red").as_number(), None);
}

// ============ Sort, projection, page window ============

#[test]
fn test_sort_keys_keep_order_and_direction() {
    let sort = parse_sort("-price, title,,+sold").unwrap();
    assert_eq!(
        sort.keys,
        vec![
            SortKey {
                field: "price".to_string(),
                order: SortOrder::Desc
            },
            SortKey {
                field: "title".to_string(),
                order: SortOrder::Asc
            },
            SortKey {
                field: "sold".to_string(),
                order: SortOrder::Asc
            },
        ]
    );
    assert_eq!(parse_sort(" , "), None);
}

#[test]
fn test_projection_parsing() {
    let projection = parse_projection("title,price").unwrap();
    assert_eq!(projection.include, vec!["title", "price"]);
    assert!(projection.exclude.is_empty());
    assert!(projection.validate().is_ok());

    let projection = parse_projection("-description,-images").unwrap();
    assert!(projection.include.is_empty());
    assert_eq!(projection.exclude, vec!["description", "images"]);
    assert!(projection.validate().is_ok());

    assert_eq!(parse_projection(""), None);
}

#[test]
fn test_projection_rejects_mixed_modes_except_id() {
    assert!(parse_projection("title,-price").unwrap().validate().is_err());
    assert!(parse_projection("title,-_id").unwrap().validate().is_ok());
}

#[test]
fn test_projection_apply_keeps_id_and_listed_fields() {
    let document = serde_json::json!({
        "_id": "1",
        "title": "Red Shoe",
        "price": 20.0,
        "color": "red"
    });
    let serde_json::Value::Object(map) = document else {
        unreachable!()
    };

    let included = parse_projection("title,missing").unwrap().apply(map.clone());
    assert_eq!(
        included.keys().cloned().collect::<Vec<_>>(),
        vec!["_id", "title"]
    );

    let excluded = parse_projection("-price,-_id").unwrap().apply(map.clone());
    assert_eq!(
        excluded.keys().cloned().collect::<Vec<_>>(),
        vec!["title", "color"]
    );

    let no_id = parse_projection("title,-_id").unwrap().apply(map);
    assert_eq!(no_id.keys().cloned().collect::<Vec<_>>(), vec!["title"]);
}

#[test]
fn test_page_window_from_page_and_limit() {
    let window = page_window(Some("2"), Some("5"), 10);
    assert_eq!(window.skip, 5);
    assert_eq!(window.limit, 5);
    assert_eq!(window.page, 2);
}

#[test]
fn test_invalid_page_falls_back_to_first_page() {
    let absent = page_window(None, Some("5"), 10);
    for raw in ["0", "abc", "-2", "1.5", ""] {
        assert_eq!(page_window(Some(raw), Some("5"), 10), absent, "page={}", raw);
    }
    assert_eq!(absent.skip, 0);
    assert_eq!(page_window(Some("3.0"), Some("5"), 10).skip, 10);
}

#[test]
fn test_invalid_limit_falls_back_to_default() {
    for raw in [None, Some("0"), Some("x"), Some("-4")] {
        assert_eq!(page_window(Some("3"), raw, 7), PageWindow::new(3, 7));
    }
    assert_eq!(page_window(None, None, 0).limit, 1);
}

// ============ SQL translation ============

#[test]
fn test_empty_filter_builds_match_all() {
    let (sql, values) = build_where(&Predicate::all()).unwrap();
    assert_eq!(sql, "1 = 1");
    assert!(values.is_empty());
}

#[test]
fn test_range_builds_exclusive_bounds() {
    let filter = compile_filter(&params(&[("price[gt]", "10"), ("price[lt]", "100")]));
    let (sql, values) = build_where(&filter).unwrap();
    assert_eq!(sql, "((price > ? AND price < ?))");
    assert_eq!(values, vec![SqlValue::Float(10.0), SqlValue::Float(100.0)]);
}

#[test]
fn test_contains_builds_case_insensitive_substring() {
    let (sql, values) = build_where(&contains("title", "Shoe")).unwrap();
    assert_eq!(sql, "instr(lower(CAST(title AS TEXT)), lower(?)) > 0");
    assert_eq!(values, vec![SqlValue::Text("Shoe".to_string())]);
}

#[test]
fn test_or_group_binds_in_order() {
    let filter = compile_filter(&params(&[("color", "red,blue"), ("totalRatings[gte]", "4")]));
    let (sql, values) = build_where(&filter).unwrap();
    assert_eq!(
        sql,
        "((instr(lower(CAST(color AS TEXT)), lower(?)) > 0 OR instr(lower(CAST(color AS TEXT)), lower(?)) > 0) AND (total_ratings >= ?))"
    );
    assert_eq!(
        values,
        vec![
            SqlValue::Text("red".to_string()),
            SqlValue::Text("blue".to_string()),
            SqlValue::Integer(4),
        ]
    );
}

#[test]
fn test_unknown_field_matches_nothing() {
    let filter = compile_filter(&params(&[("weight", "3")]));
    let (sql, values) = build_where(&filter).unwrap();
    assert_eq!(sql, "(0 = 1)");
    assert!(values.is_empty());
}

#[test]
fn test_text_value_on_numeric_field_is_a_cast_error() {
    let filter = compile_filter(&params(&[("price", "abc")]));
    let err = build_where(&filter).unwrap_err();
    assert!(err.contains("price"), "unexpected error: {}", err);
}

#[test]
fn test_numeric_value_on_text_field_is_compared_as_text() {
    let filter = compile_filter(&params(&[("brand", "3")]));
    let (sql, values) = build_where(&filter).unwrap();
    assert_eq!(sql, "(brand = ?)");
    assert_eq!(values, vec![SqlValue::Text("3".to_string())]);
}

#[test]
fn test_numeric_looking_text_is_bound_unchanged() {
    for raw in ["007", "1e3", "1.0", "-0"] {
        let filter = compile_filter(&params(&[("brand", raw)]));
        let (_, values) = build_where(&filter).unwrap();
        assert_eq!(values, vec![SqlValue::Text(raw.to_string())], "brand={}", raw);
    }
}

#[test]
fn test_numeric_columns_cast_by_column_type() {
    let filter = compile_filter(&params(&[("quantity", "007"), ("price[gte]", "1e1")]));
    let (sql, values) = build_where(&filter).unwrap();
    assert_eq!(sql, "((price >= ?) AND quantity = ?)");
    assert_eq!(values, vec![SqlValue::Float(10.0), SqlValue::Integer(7)]);
}

#[test]
fn test_order_by_defaults_to_insertion_order() {
    assert_eq!(build_order_by(None), "rowid ASC");
}

#[test]
fn test_order_by_maps_fields_and_skips_unknown() {
    let sort = parse_sort("-price,bogus,totalRatings,price").unwrap();
    assert_eq!(
        build_order_by(Some(&sort)),
        "price DESC, total_ratings ASC, rowid ASC"
    );
}
