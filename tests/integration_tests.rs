//! End-to-end tests: build a program, transform schedules, generate the
//! loop AST, and check its shape.

use polysched::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn leaf_names(nodes: &[AstNode]) -> Vec<String> {
    let mut names = Vec::new();
    collect_leaves(nodes, &mut names);
    names
}

fn collect_leaves(nodes: &[AstNode], out: &mut Vec<String>) {
    for node in nodes {
        match node {
            AstNode::For { body, .. } | AstNode::If { body, .. } => collect_leaves(body, out),
            AstNode::Stmt { name, .. } => out.push(name.clone()),
        }
    }
}

#[test]
fn test_identity_schedule_matches_domain_structure() {
    init_logging();
    let mut program = Program::new("identity").unwrap();
    program
        .declare_statement(
            "[N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }",
            ValueHandle(0),
        )
        .unwrap();
    let ast = generate_ast(&mut program).unwrap();

    assert_eq!(ast.len(), 1);
    let AstNode::For {
        iterator,
        lower,
        upper,
        body,
        ..
    } = &ast[0]
    else {
        panic!("expected outer loop, got {}", ast_to_string(&ast));
    };
    assert_eq!(iterator, "c0");
    assert_eq!(*lower, AstExpr::Int(0));
    assert_eq!(
        *upper,
        AstExpr::sub(AstExpr::Var("N".into()), AstExpr::Int(1))
    );
    let AstNode::For { upper, body, .. } = &body[0] else {
        panic!("expected inner loop");
    };
    assert_eq!(
        *upper,
        AstExpr::sub(AstExpr::Var("M".into()), AstExpr::Int(1))
    );
    let AstNode::Stmt { name, bindings, .. } = &body[0] else {
        panic!("expected leaf");
    };
    assert_eq!(name, "S");
    assert_eq!(
        bindings,
        &vec![
            ("i".to_string(), AstExpr::Var("c0".into())),
            ("j".to_string(), AstExpr::Var("c1".into())),
        ]
    );
}

#[test]
fn test_split_reconstructs_original_coordinate() {
    init_logging();
    let mut program = Program::new("split").unwrap();
    program
        .declare_statement("{ S[i] : 0 <= i < 13 }", ValueHandle(0))
        .unwrap();
    program.statement_mut("S").unwrap().split(0, 5).unwrap();

    let statement = program.statement("S").unwrap();
    for i in 0..13 {
        // The unique image is (i / 5, i mod 5), and inner stays in range.
        for outer in -1..4 {
            for inner in -1..6 {
                let expected = outer == i / 5 && inner == i % 5;
                assert_eq!(
                    statement.schedule().contains_pair(&[i], &[outer, inner], &[]),
                    expected,
                    "i={} outer={} inner={}",
                    i,
                    outer,
                    inner
                );
            }
        }
    }
}

#[test]
fn test_tile_orders_dimensions_outer_first() {
    init_logging();
    let mut program = Program::new("tile").unwrap();
    program
        .declare_statement("{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }", ValueHandle(0))
        .unwrap();
    program
        .statement_mut("S")
        .unwrap()
        .tile(0, 1, 4, 4)
        .unwrap();

    let statement = program.statement("S").unwrap();
    assert_eq!(statement.range_dim(), 4);
    for &(i, j) in &[(0, 0), (5, 13), (9, 19)] {
        assert!(statement
            .schedule()
            .contains_pair(&[i, j], &[i / 4, j / 4, i % 4, j % 4], &[]));
    }
    // Points in different tiles take different leading coordinates.
    assert!(!statement
        .schedule()
        .contains_pair(&[5, 13], &[0, 3, 1, 1], &[]));
}

#[test]
fn test_interchange_twice_is_identity() {
    init_logging();
    let mut program = Program::new("interchange").unwrap();
    program
        .declare_statement("[N] -> { S[i, j] : 0 <= i < N and 0 <= j < 7 }", ValueHandle(0))
        .unwrap();
    let statement = program.statement_mut("S").unwrap();
    statement.interchange(0, 1).unwrap();
    statement.interchange(0, 1).unwrap();
    for i in 0..4 {
        for j in 0..7 {
            assert!(statement.schedule().contains_pair(&[i, j], &[i, j], &[4]));
            if i != j {
                assert!(!statement.schedule().contains_pair(&[i, j], &[j, i], &[4]));
            }
        }
    }
}

#[test]
fn test_after_orders_coordinates_and_subtrees() {
    init_logging();
    let mut program = Program::new("after").unwrap();
    program
        .declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
        .unwrap();
    program
        .declare_statement("{ B[i] : 0 <= i < 10 }", ValueHandle(2))
        .unwrap();
    program.after("B", "A", 0).unwrap();

    // B's coordinate at the ordering level compares greater than A's.
    let a = program.statement("A").unwrap().schedule().clone();
    let b = program.statement("B").unwrap().schedule().clone();
    for i in 0..10 {
        assert!(a.contains_pair(&[i], &[0, i], &[]));
        assert!(b.contains_pair(&[i], &[1, i], &[]));
        assert!(!b.contains_pair(&[i], &[0, i], &[]));
    }

    // The AST visits all of A strictly before all of B.
    let ast = generate_ast(&mut program).unwrap();
    assert_eq!(ast.len(), 2, "got {}", ast_to_string(&ast));
    assert!(matches!(&ast[0], AstNode::For { .. }));
    assert!(matches!(&ast[1], AstNode::For { .. }));
    assert_eq!(leaf_names(&ast[0..1]), vec!["A"]);
    assert_eq!(leaf_names(&ast[1..2]), vec!["B"]);
}

#[test]
fn test_alignment_pads_discardable_zeros() {
    init_logging();
    let mut program = Program::new("align").unwrap();
    program
        .declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
        .unwrap();
    program
        .declare_statement("{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(2))
        .unwrap();
    program.align_schedules();

    let a = program.statement("A").unwrap();
    assert_eq!(a.range_dim(), 2);
    assert_eq!(a.pre_alignment_range_dim(), 1);
    for i in 0..10 {
        // Original coordinate preserved, padding pinned to zero.
        assert!(a.schedule().contains_pair(&[i], &[i, 0], &[]));
        assert!(!a.schedule().contains_pair(&[i], &[i, 1], &[]));
    }

    let union = program.gen_time_processor_domain();
    assert_eq!(union.len(), 2);
    for set in union.iter() {
        assert_eq!(set.n_dim(), 2);
    }
}

#[test]
fn test_end_to_end_tiled_parallel_example() {
    init_logging();
    let mut program = Program::new("tiled").unwrap();
    program
        .declare_statement("{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }", ValueHandle(42))
        .unwrap();
    program
        .statement_mut("S")
        .unwrap()
        .tile(0, 1, 2, 2)
        .unwrap();
    program.tag_parallel_dimension("S", 0).unwrap();

    let ast = generate_ast(&mut program).unwrap();
    assert_eq!(ast.len(), 1);

    // Four nest levels: i/2 in [0,5), j/2 in [0,10), i%2 and j%2 in [0,2).
    let mut expected = vec![
        ("c0", 0, 4, true),
        ("c1", 0, 9, false),
        ("c2", 0, 1, false),
        ("c3", 0, 1, false),
    ]
    .into_iter();
    let mut current = &ast[0];
    loop {
        let AstNode::For {
            iterator,
            lower,
            upper,
            body,
            is_parallel,
            ..
        } = current
        else {
            break;
        };
        let (name, lo, hi, parallel) = expected.next().unwrap();
        assert_eq!(iterator, name);
        assert_eq!(*lower, AstExpr::Int(lo));
        assert_eq!(*upper, AstExpr::Int(hi));
        assert_eq!(*is_parallel, parallel, "level {}", name);
        current = &body[0];
    }
    assert!(expected.next().is_none(), "missing nest levels");

    let AstNode::Stmt {
        name,
        payload,
        bindings,
        ..
    } = current
    else {
        panic!("expected leaf, got {}", ast_to_string(&ast));
    };
    assert_eq!(name, "S");
    assert_eq!(*payload, ValueHandle(42));
    // i = 2*c0 + c2, j = 2*c1 + c3
    assert_eq!(
        bindings[0],
        (
            "i".to_string(),
            AstExpr::add(
                AstExpr::mul(AstExpr::Int(2), AstExpr::Var("c0".into())),
                AstExpr::Var("c2".into()),
            )
        )
    );
    assert_eq!(
        bindings[1],
        (
            "j".to_string(),
            AstExpr::add(
                AstExpr::mul(AstExpr::Int(2), AstExpr::Var("c1".into())),
                AstExpr::Var("c3".into()),
            )
        )
    );
}

#[test]
fn test_end_to_end_sequential_example() {
    init_logging();
    let mut program = Program::new("sequential").unwrap();
    program
        .declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
        .unwrap();
    program
        .declare_statement("{ B[i] : 0 <= i < 10 }", ValueHandle(2))
        .unwrap();
    program.after("B", "A", 0).unwrap();

    let ast = generate_ast(&mut program).unwrap();
    // Two sequential top-level subtrees, not one interleaved loop.
    assert_eq!(ast.len(), 2, "got {}", ast_to_string(&ast));
    assert_eq!(leaf_names(&ast), vec!["A", "B"]);
    for node in &ast {
        let AstNode::For { lower, upper, .. } = node else {
            panic!("expected loop");
        };
        assert_eq!(*lower, AstExpr::Int(0));
        assert_eq!(*upper, AstExpr::Int(9));
    }
}

#[test]
fn test_invariants_and_schedule_union() {
    init_logging();
    let mut program = Program::new("union").unwrap();
    program.add_invariant("N", ValueHandle(100)).unwrap();
    assert_eq!(program.invariants()[0].name(), "N");
    program
        .declare_statement("[N] -> { A[i] : 0 <= i < N }", ValueHandle(1))
        .unwrap();
    program
        .declare_statement("[N] -> { B[i, j] : 0 <= i < N and 0 <= j < 3 }", ValueHandle(2))
        .unwrap();

    let schedules = program.schedules();
    assert_eq!(schedules.len(), 2);
    for map in schedules.iter() {
        assert_eq!(map.n_out(), 2);
    }

    // Domain pieces keep their own arities; only schedules align.
    let domains = program.iteration_domains();
    assert_eq!(domains.len(), 2);
    let arities: Vec<usize> = domains.iter().map(|s| s.n_dim()).collect();
    assert_eq!(arities, vec![1, 2]);
}

#[test]
fn test_vector_tag_reaches_loop() {
    init_logging();
    let mut program = Program::new("vector").unwrap();
    program
        .declare_statement("{ S[i] : 0 <= i < 16 }", ValueHandle(0))
        .unwrap();
    program.tag_vector_dimension("S", 0).unwrap();
    let ast = generate_ast(&mut program).unwrap();
    let AstNode::For {
        is_vector,
        is_parallel,
        ..
    } = &ast[0]
    else {
        panic!("expected loop");
    };
    assert!(*is_vector);
    assert!(!*is_parallel);
}

#[test]
fn test_padding_levels_are_never_tagged() {
    init_logging();
    let mut program = Program::new("padtag").unwrap();
    program
        .declare_statement("{ A[i] : 0 <= i < 4 }", ValueHandle(1))
        .unwrap();
    program
        .declare_statement("{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(2))
        .unwrap();
    program.align_schedules();
    // Level 1 of A exists only as alignment padding; the tag table
    // accepts it but generation must not realize it.
    program.tag_parallel_dimension("A", 1).unwrap();
    program.tag_parallel_dimension("B", 1).unwrap();
    let ast = generate_ast(&mut program).unwrap();
    let AstNode::For { body, .. } = &ast[0] else {
        panic!("expected outer loop, got {}", ast_to_string(&ast));
    };
    let inner: Vec<&AstNode> = body
        .iter()
        .filter(|n| matches!(n, AstNode::For { .. }))
        .collect();
    assert_eq!(inner.len(), 1);
    let AstNode::For { is_parallel, .. } = inner[0] else {
        unreachable!();
    };
    // B's tag applies; A is a single point at this level.
    assert!(*is_parallel);
}

#[test]
fn test_non_identity_access_reaches_leaf() {
    init_logging();
    let mut program = Program::new("access").unwrap();
    program
        .declare_statement("{ S[i, j] : 0 <= i < 8 and 0 <= j < 8 }", ValueHandle(0))
        .unwrap();
    program
        .statement_mut("S")
        .unwrap()
        .set_access("{ S[i, j] -> buf[j, i + 1] }")
        .unwrap();

    let ast = generate_ast(&mut program).unwrap();
    let AstNode::For { body, .. } = &ast[0] else {
        panic!("expected outer loop, got {}", ast_to_string(&ast));
    };
    let AstNode::For { body, .. } = &body[0] else {
        panic!("expected inner loop");
    };
    let AstNode::Stmt { bindings, access, .. } = &body[0] else {
        panic!("expected leaf");
    };
    assert_eq!(bindings[0].1, AstExpr::Var("c0".into()));
    assert_eq!(bindings[1].1, AstExpr::Var("c1".into()));
    // buf[j, i + 1] with the bindings substituted.
    let access = access.as_ref().unwrap();
    assert_eq!(access.buffer, "buf");
    assert_eq!(access.indices[0], AstExpr::Var("c1".into()));
    assert_eq!(
        access.indices[1],
        AstExpr::add(AstExpr::Var("c0".into()), AstExpr::Int(1))
    );
}

#[test]
fn test_transform_errors_are_fatal_and_typed() {
    init_logging();
    let mut program = Program::new("errors").unwrap();
    program
        .declare_statement("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(0))
        .unwrap();
    let statement = program.statement_mut("S").unwrap();
    assert!(statement.split(5, 2).is_err());
    assert!(statement.split(0, 0).is_err());
    assert!(statement.tile(0, 0, 2, 2).is_err());
    assert!(program.statement("missing").is_err());
    assert!(Program::new("").is_err());
}
