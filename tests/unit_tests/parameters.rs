use fenris_adjoint::error::CacheError;
use fenris_adjoint::parameters::{
    parameters_key, FormCompilerParameters, LinearSolverMethod, LinearSolverParameters, Parameter, Parameters,
    MAX_QUADRATURE_DEGREE,
};

#[test]
fn parameters_deserialize_from_json() {
    let json = r#"{
        "linear_solver": "cg",
        "krylov_solver": { "relative_tolerance": 1e-12, "maximum_iterations": 500 }
    }"#;
    let parameters: Parameters = serde_json::from_str(json).unwrap();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters.get("linear_solver"), Some(&Parameter::Text("cg".to_string())));

    let solver = LinearSolverParameters::from_parameters(&parameters).unwrap();
    assert_eq!(solver.method, LinearSolverMethod::ConjugateGradient);
    assert_eq!(solver.relative_tolerance, 1e-12);
    assert_eq!(solver.max_iterations, 500);

    let serialized = serde_json::to_string(&parameters).unwrap();
    let deserialized: Parameters = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, parameters);
}

#[test]
fn parameters_key_does_not_depend_on_insertion_order() {
    let nested = Parameters::new().with("relative_tolerance", 1e-8);
    let a = Parameters::new()
        .with("linear_solver", "cg")
        .with("krylov_solver", nested.clone())
        .with("flag", true);
    let b = Parameters::new()
        .with("flag", true)
        .with("krylov_solver", nested)
        .with("linear_solver", "cg");
    assert_eq!(parameters_key(&a), parameters_key(&b));

    let c = a.clone().with("flag", false);
    assert_ne!(parameters_key(&a), parameters_key(&c));

    // Integers and floats are distinct parameter values
    let int = Parameters::new().with("quadrature_degree", 2i64);
    let float = Parameters::new().with("quadrature_degree", 2.0);
    assert_ne!(parameters_key(&int), parameters_key(&float));
    assert_eq!(parameters_key(&Parameters::new()), parameters_key(&Parameters::default()));
}

#[test]
fn form_compiler_parameters() {
    let defaults = FormCompilerParameters::from_parameters(&Parameters::new()).unwrap();
    assert_eq!(defaults, FormCompilerParameters::default());
    assert_eq!(defaults.quadrature_degree, None);

    let parameters = Parameters::new().with("quadrature_degree", 4i64);
    let parsed = FormCompilerParameters::from_parameters(&parameters).unwrap();
    assert_eq!(parsed.quadrature_degree, Some(4));

    let negative = Parameters::new().with("quadrature_degree", -1i64);
    assert!(matches!(
        FormCompilerParameters::from_parameters(&negative),
        Err(CacheError::InvalidArgument(_))
    ));
    let largest = Parameters::new().with("quadrature_degree", MAX_QUADRATURE_DEGREE as i64);
    let parsed = FormCompilerParameters::from_parameters(&largest).unwrap();
    assert_eq!(parsed.quadrature_degree, Some(MAX_QUADRATURE_DEGREE));
    for degree in [MAX_QUADRATURE_DEGREE as i64 + 1, 1 << 40] {
        let excessive = Parameters::new().with("quadrature_degree", degree);
        assert!(matches!(
            FormCompilerParameters::from_parameters(&excessive),
            Err(CacheError::InvalidArgument(_))
        ));
    }
    let unknown = Parameters::new().with("optimize", true);
    assert!(matches!(
        FormCompilerParameters::from_parameters(&unknown),
        Err(CacheError::InvalidArgument(_))
    ));
}

#[test]
fn linear_solver_parameters() {
    let defaults = LinearSolverParameters::from_parameters(&Parameters::new()).unwrap();
    assert_eq!(defaults, LinearSolverParameters::default());
    assert_eq!(defaults.method, LinearSolverMethod::Lu);

    for (name, method) in [
        ("cg", LinearSolverMethod::ConjugateGradient),
        ("cholesky", LinearSolverMethod::Cholesky),
        ("lu", LinearSolverMethod::Lu),
        ("default", LinearSolverMethod::Lu),
    ] {
        let parameters = Parameters::new().with("linear_solver", name);
        let parsed = LinearSolverParameters::from_parameters(&parameters).unwrap();
        assert_eq!(parsed.method, method);
    }

    // Integer tolerances are accepted
    let krylov = Parameters::new().with("relative_tolerance", 1i64);
    let parameters = Parameters::new().with("krylov_solver", krylov);
    let parsed = LinearSolverParameters::from_parameters(&parameters).unwrap();
    assert_eq!(parsed.relative_tolerance, 1.0);
}

#[test]
fn invalid_linear_solver_parameters_are_rejected() {
    let invalid = [
        Parameters::new().with("linear_solver", "gmres"),
        Parameters::new().with("linear_solver", 3i64),
        Parameters::new().with("krylov_solver", 3i64),
        Parameters::new().with("preconditioner", "ilu"),
        Parameters::new().with(
            "krylov_solver",
            Parameters::new().with("relative_tolerance", -1.0),
        ),
        Parameters::new().with(
            "krylov_solver",
            Parameters::new().with("maximum_iterations", 2.5),
        ),
        Parameters::new().with(
            "krylov_solver",
            Parameters::new().with("absolute_tolerance", 1e-12),
        ),
    ];
    for parameters in &invalid {
        let result = LinearSolverParameters::from_parameters(parameters);
        assert!(
            matches!(result, Err(CacheError::InvalidArgument(_))),
            "accepted {:?}",
            parameters
        );
    }
}
