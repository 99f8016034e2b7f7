//! Mutable fields with identity and mutation state.
//!
//! Every field that may be a dependency of a cached artifact implements [`Field`]. The trait
//! exposes the field's process-unique identity, a state counter which is incremented on every
//! mutation, and a handful of capability flags with explicit defaults.
use crate::error::CacheError;
use crate::space::FunctionSpace;
use nalgebra::DVector;
use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Process-unique identity of a field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

impl FieldId {
    /// Allocate a new identity, distinct from every identity previously handed out in this process.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A snapshot of a field's identity and mutation state.
///
/// `state` is `None` for placeholders which carry no values and hence no state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldState {
    pub id: FieldId,
    pub state: Option<u64>,
}

impl FieldState {
    pub fn new(id: FieldId, state: u64) -> Self {
        Self { id, state: Some(state) }
    }
}

/// Capability interface of mutable fields.
pub trait Field {
    fn id(&self) -> FieldId;

    /// The current value of the mutation counter.
    fn state(&self) -> Option<u64>;

    /// Static fields are never modified after their initial assignment.
    fn is_static(&self) -> bool {
        false
    }

    /// Whether artifacts depending on this field may be cached.
    fn is_cached(&self) -> bool {
        false
    }

    fn is_checkpointed(&self) -> bool {
        true
    }

    /// Order of the tangent-linear this field belongs to, zero for forward fields.
    fn tlm_depth(&self) -> usize {
        0
    }

    fn snapshot(&self) -> FieldState {
        FieldState {
            id: self.id(),
            state: self.state(),
        }
    }
}

/// Capability flags of a field.
///
/// By default a field is neither static nor cached, and it is checkpointed. A static field is
/// by default also cached and not checkpointed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldFlags {
    pub is_static: bool,
    pub cache: bool,
    pub checkpoint: bool,
    pub tlm_depth: usize,
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self {
            is_static: false,
            cache: false,
            checkpoint: true,
            tlm_depth: 0,
        }
    }
}

impl FieldFlags {
    pub fn static_field() -> Self {
        Self {
            is_static: true,
            cache: true,
            checkpoint: false,
            tlm_depth: 0,
        }
    }

    pub fn with_cache(self, cache: bool) -> Self {
        Self { cache, ..self }
    }

    pub fn with_checkpoint(self, checkpoint: bool) -> Self {
        Self { checkpoint, ..self }
    }

    pub fn with_tlm_depth(self, tlm_depth: usize) -> Self {
        Self { tlm_depth, ..self }
    }
}

#[derive(Debug)]
struct FunctionData {
    id: FieldId,
    name: String,
    space: FunctionSpace,
    values: RefCell<DVector<f64>>,
    state: Cell<u64>,
    flags: FieldFlags,
}

/// A finite element function: a vector of degrees of freedom in a [`FunctionSpace`].
///
/// `Function` is a shared handle. Clones refer to the same values, identity and state; use
/// [`Function::new_like`] followed by [`Function::assign`] for a deep copy.
#[derive(Debug, Clone)]
pub struct Function {
    data: Rc<FunctionData>,
}

impl Function {
    /// A zero-valued function in the given space.
    pub fn new(space: &FunctionSpace, name: impl Into<String>) -> Self {
        Self::with_flags(space, name, FieldFlags::default())
    }

    pub fn with_flags(space: &FunctionSpace, name: impl Into<String>, flags: FieldFlags) -> Self {
        Self {
            data: Rc::new(FunctionData {
                id: FieldId::new_unique(),
                name: name.into(),
                space: space.clone(),
                values: RefCell::new(DVector::zeros(space.dim())),
                state: Cell::new(0),
                flags,
            }),
        }
    }

    /// A spatially constant function in a new real space.
    pub fn constant(value: f64, name: impl Into<String>, flags: FieldFlags) -> Self {
        let function = Self::with_flags(&FunctionSpace::real(), name, flags);
        function.data.values.borrow_mut()[0] = value;
        function
    }

    /// A P1 function interpolating `f` at the mesh vertices.
    ///
    /// # Panics
    ///
    /// Panics if the space has no mesh.
    pub fn interpolate(
        space: &FunctionSpace,
        name: impl Into<String>,
        flags: FieldFlags,
        f: impl Fn(f64) -> f64,
    ) -> Self {
        let mesh = space
            .mesh()
            .expect("Can only interpolate into a space defined on a mesh");
        let values = DVector::from_iterator(mesh.num_vertices(), mesh.vertices().iter().map(|&x| f(x)));
        let function = Self::with_flags(space, name, flags);
        *function.data.values.borrow_mut() = values;
        function
    }

    /// A new zero-valued function in the same space, with the given flags.
    pub fn new_like(&self, name: impl Into<String>, flags: FieldFlags) -> Self {
        Self::with_flags(&self.data.space, name, flags)
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.data.space
    }

    pub fn flags(&self) -> FieldFlags {
        self.data.flags
    }

    pub fn values(&self) -> Ref<DVector<f64>> {
        self.data.values.borrow()
    }

    /// The degrees of freedom of a function in a real space.
    pub fn value(&self) -> f64 {
        self.data.values.borrow()[0]
    }

    /// Replace all degrees of freedom.
    ///
    /// # Panics
    ///
    /// Panics if the number of values does not match the dimension of the space.
    pub fn set_values(&self, values: DVector<f64>) {
        assert_eq!(values.len(), self.data.space.dim(), "Invalid number of values");
        *self.data.values.borrow_mut() = values;
        self.update_state();
    }

    /// Copy the values of another function in a space of the same dimension.
    pub fn assign(&self, other: &Function) {
        let values = other.values().clone_owned();
        self.set_values(values);
    }

    /// `self <- self + alpha * x`.
    pub fn axpy(&self, alpha: f64, x: &Function) {
        assert_eq!(x.data.space.dim(), self.data.space.dim(), "Invalid function space");
        {
            let x_values = x.data.values.borrow().clone_owned();
            let mut values = self.data.values.borrow_mut();
            values.axpy(alpha, &x_values, 1.0);
        }
        self.update_state();
    }

    pub fn zero(&self) {
        self.data.values.borrow_mut().fill(0.0);
        self.update_state();
    }

    /// Record a mutation that happened without going through the methods of this type.
    pub fn update_state(&self) {
        self.data.state.set(self.data.state.get() + 1);
    }

    /// The tangent-linear function associated with this function, or `None` for static
    /// functions, which have no tangent-linear.
    pub fn tangent_linear(&self, name: impl Into<String>) -> Option<Function> {
        let flags = self.data.flags;
        if flags.is_static {
            None
        } else {
            let flags = FieldFlags {
                is_static: false,
                cache: flags.cache,
                checkpoint: flags.checkpoint,
                tlm_depth: flags.tlm_depth + 1,
            };
            Some(self.new_like(name, flags))
        }
    }

    /// The value-less placeholder sharing this function's identity.
    pub fn replacement(&self) -> Replacement {
        Replacement {
            id: self.data.id,
            name: self.data.name.clone().into(),
            space: self.data.space.clone(),
            flags: self.data.flags,
        }
    }
}

impl Field for Function {
    fn id(&self) -> FieldId {
        self.data.id
    }

    fn state(&self) -> Option<u64> {
        Some(self.data.state.get())
    }

    fn is_static(&self) -> bool {
        self.data.flags.is_static
    }

    fn is_cached(&self) -> bool {
        self.data.flags.cache
    }

    fn is_checkpointed(&self) -> bool {
        self.data.flags.checkpoint
    }

    fn tlm_depth(&self) -> usize {
        self.data.flags.tlm_depth
    }
}

/// A symbolic stand-in for a [`Function`], carrying its identity, space and flags but no values.
///
/// Replacements are used to build structural keys of forms which do not depend on which
/// particular handle of a function appears in the form.
#[derive(Debug, Clone)]
pub struct Replacement {
    id: FieldId,
    name: Rc<str>,
    space: FunctionSpace,
    flags: FieldFlags,
}

impl Replacement {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }

    /// Always fails: a replacement has no values that could change.
    pub fn update_state(&self) -> Result<(), CacheError> {
        Err(CacheError::ImmutableField(self.id))
    }
}

impl Field for Replacement {
    fn id(&self) -> FieldId {
        self.id
    }

    fn state(&self) -> Option<u64> {
        None
    }

    fn is_static(&self) -> bool {
        self.flags.is_static
    }

    fn is_cached(&self) -> bool {
        self.flags.cache
    }

    fn is_checkpointed(&self) -> bool {
        self.flags.checkpoint
    }

    fn tlm_depth(&self) -> usize {
        self.flags.tlm_depth
    }
}

macro_rules! impl_identity_comparisons {
    ($type:ty) => {
        impl PartialEq for $type {
            fn eq(&self, other: &Self) -> bool {
                self.id() == other.id()
            }
        }

        impl Eq for $type {}

        impl Hash for $type {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id().hash(state)
            }
        }

        impl PartialOrd for $type {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $type {
            fn cmp(&self, other: &Self) -> Ordering {
                self.id().cmp(&other.id())
            }
        }
    };
}

impl_identity_comparisons!(Function);
impl_identity_comparisons!(Replacement);
