use amr_relax::prelude::*;

/// 2x2 grid of unit boxes at the bottom, one wide box on top.
///
/// ```text
///  +---------+
///  |    0    |
///  +----+----+
///  | 1  | 2  |
///  +----+----+
///  | 3  | 4  |
///  +----+----+
/// ```
const FIVE_BOXES: &str = "\
5 3 2
0
0 0 1 2
0
2 1 2
0
0
100.0
1
1 0 1 1
1 0
1 3
0
1 2
40.0
2
1 1 1 1
1 0
1 4
1 1
0
30.0
3
2 0 1 1
1 1
0
0
1 4
20.0
4
2 1 1 1
1 2
0
1 3
0
10.0
";

#[test]
fn geometry_becomes_overlaps() {
    let input = AmrTextReader.read(FIVE_BOXES.as_bytes()).unwrap();
    let mesh = &input.mesh;
    assert_eq!(mesh.len(), 5);
    assert_eq!((input.rows, input.cols), (3.0, 2.0));
    assert_eq!(input.initial, vec![100.0, 40.0, 30.0, 20.0, 10.0]);

    assert_eq!(mesh.perimeter(0), 6.0);
    assert_eq!(mesh.neighbors(0).collect::<Vec<_>>(), vec![(1, 1.0), (2, 1.0)]);
    assert_eq!(mesh.self_overlap(0), 4.0);

    // interior-facing box: top, bottom and right are shared
    assert_eq!(mesh.perimeter(1), 4.0);
    assert_eq!(mesh.neighbors(1).count(), 3);
    assert_eq!(mesh.self_overlap(1), 1.0);

    assert!(mesh.validate_invariants().is_ok());
    assert!(mesh.asymmetric_links().is_empty());
}

#[test]
fn loaded_mesh_relaxes_consistently() {
    let input = AmrTextReader.read(FIVE_BOXES.as_bytes()).unwrap();
    let mut engine = Engine::new();
    let cfg = RelaxConfig::new(0.1, 0.1);
    let one = engine.run(&input.mesh, input.initial.clone(), &cfg).unwrap();
    let three = engine
        .run(&input.mesh, input.initial.clone(), &cfg.clone().with_workers(3))
        .unwrap();
    assert_eq!(one, three);
    assert!(one.iterations > 0);
    assert!((one.max - one.min) / one.max <= 0.1);
}

#[test]
fn asymmetric_description_still_runs() {
    // box 4 forgets its left neighbor; box 3 still lists it on the right
    let text = FIVE_BOXES.replace("1 2\n0\n1 3\n0\n10.0", "1 2\n0\n0\n0\n10.0");
    let input = AmrTextReader.read(text.as_bytes()).unwrap();
    assert_eq!(input.mesh.asymmetric_links(), vec![(3, 4)]);
    assert_eq!(input.mesh.self_overlap(4), 3.0);

    let cfg = RelaxConfig::new(0.3, 0.05).with_workers(2);
    let shared = Engine::new().run(&input.mesh, input.initial.clone(), &cfg).unwrap();
    let distributed = Engine::new()
        .run_distributed_local(&input.mesh, input.initial, &cfg)
        .unwrap();
    assert_eq!(shared, distributed);
}

#[test]
fn reads_from_a_file() {
    let path = std::env::temp_dir().join(format!("amr-relax-{}.txt", std::process::id()));
    std::fs::write(&path, FIVE_BOXES).unwrap();
    let from_file = AmrTextReader.read_path(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(
        from_file.unwrap(),
        AmrTextReader.read(FIVE_BOXES.as_bytes()).unwrap()
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let err = AmrTextReader
        .read_path("/definitely/not/a/mesh.txt")
        .unwrap_err();
    assert!(matches!(err, AmrError::MeshIo(_)));
}

#[test]
fn empty_mesh_rejected() {
    assert_eq!(
        AmrTextReader.read("0 1 1".as_bytes()),
        Err(AmrError::EmptyMesh)
    );
}
