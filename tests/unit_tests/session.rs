use fenris_adjoint::assembly::FiniteElementBackend;
use fenris_adjoint::cache::{AssemblyCache, CacheRegistry, LinearSolverCache};
use fenris_adjoint::error::CacheError;
use fenris_adjoint::field::{Field, Function};
use fenris_adjoint::form::{dx, Expr};
use fenris_adjoint::parameters::Parameters;
use fenris_adjoint::session::Session;
use util::p1_space;

#[test]
fn default_caches_live_in_the_session_registry() {
    let session = Session::new();
    assert_eq!(session.registry().num_caches(), 2);
    assert!(session.assembly_cache().registry().ptr_eq(session.registry()));
    assert!(session.linear_solver_cache().registry().ptr_eq(session.registry()));
    assert_ne!(session.assembly_cache().id(), session.linear_solver_cache().id());
}

#[test]
fn setters_return_the_previous_cache() {
    let mut session = Session::default();
    let previous_id = session.assembly_cache().id();

    let replacement = AssemblyCache::new(session.registry());
    let replacement_id = replacement.id();
    let previous = session.set_assembly_cache(replacement).unwrap();
    assert_eq!(previous.id(), previous_id);
    assert_eq!(session.assembly_cache().id(), replacement_id);
    drop(previous);
    assert_eq!(session.registry().num_caches(), 2);

    let previous_id = session.linear_solver_cache().id();
    let replacement = LinearSolverCache::new(session.registry());
    let previous = session.set_linear_solver_cache(replacement).unwrap();
    assert_eq!(previous.id(), previous_id);
}

#[test]
fn caches_of_other_registries_are_rejected() {
    let mut session = Session::new();
    let other = CacheRegistry::new();
    let id = session.assembly_cache().id();

    let result = session.set_assembly_cache(AssemblyCache::new(&other));
    assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    assert_eq!(session.assembly_cache().id(), id);

    let result = session.set_linear_solver_cache(LinearSolverCache::new(&other));
    assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
}

#[test]
fn session_reports_mutations_to_its_caches() {
    let session = Session::new();
    let backend = FiniteElementBackend::new();
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let g = Function::new(&space, "g");
    let parameters = Parameters::new();

    let assemble = |function: &Function| {
        session
            .assembly_cache()
            .assemble(&backend, &(Expr::from(function) * dx()), &[], &parameters, None)
            .unwrap()
            .0
    };
    let f_entry = assemble(&f);
    let g_entry = assemble(&g);

    f.update_state();
    session.update_caches(&[&f, &g], None).unwrap();
    assert!(f_entry.is_cleared());
    assert!(!g_entry.is_cleared());

    // The snapshot of another field stands in for the current state of g
    let g_entry = assemble(&g);
    let dependencies: [&dyn Field; 2] = [&f, &f];
    session.update_caches(&[&f, &g], Some(&dependencies[..])).unwrap();
    assert!(g_entry.is_cleared());

    let result = session.update_caches(&[&f, &g], Some(&dependencies[..1]));
    assert!(matches!(result, Err(CacheError::InvalidArgument(_))));

    let f_entry = assemble(&f);
    let g_entry = assemble(&g);
    session.clear_caches(&[&g]);
    assert!(!f_entry.is_cleared());
    assert!(g_entry.is_cleared());
    session.clear_caches(&[]);
    assert!(f_entry.is_cleared());
    assert!(session.assembly_cache().is_empty());
}
