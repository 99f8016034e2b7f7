use crate::assembly::{Backend, Tensor};
use crate::bc::{BcId, DirichletBc};
use crate::cache::{Cache, CacheRef, CacheRegistry};
use crate::error::CacheError;
use crate::form::{form_key, replace, Form, FormKey, ReplaceMap};
use crate::parameters::{parameters_key, FormCompilerParameters, Parameters, ParametersKey};
use eyre::eyre;
use log::debug;
use std::ops::Deref;
use std::rc::Rc;

/// Key of an assembled form: the canonical form, the boundary conditions and the form compiler
/// parameters.
pub type AssemblyKey = (FormKey, Vec<BcId>, ParametersKey);

pub fn assemble_key(form: &Form, bcs: &[DirichletBc], form_compiler_parameters: &Parameters) -> AssemblyKey {
    (
        form_key(form),
        bcs.iter().map(DirichletBc::id).collect(),
        parameters_key(form_compiler_parameters),
    )
}

/// Replace `form` according to `replace_map`, if given.
fn assembly_form(form: &Form, replace_map: Option<&ReplaceMap>) -> Form {
    match replace_map {
        Some(map) => replace(form, map),
        None => form.clone(),
    }
}

/// A cache of assembled forms.
///
/// Dereferences to the underlying [`Cache`], e.g. for clearing or inspecting entries.
#[derive(Debug)]
pub struct AssemblyCache {
    cache: Cache<AssemblyKey, Tensor>,
}

impl AssemblyCache {
    pub fn new(registry: &CacheRegistry) -> Self {
        Self {
            cache: Cache::new(registry),
        }
    }

    /// Assemble `form`, or return the cached result of a previous assembly of an equivalent
    /// form.
    ///
    /// Boundary conditions are applied to vectors and, symmetrically, to matrices. If
    /// `replace_map` is given, the form is assembled with the substituted coefficients, but
    /// cached under the key and dependencies of `form` itself.
    pub fn assemble(
        &self,
        backend: &dyn Backend,
        form: &Form,
        bcs: &[DirichletBc],
        form_compiler_parameters: &Parameters,
        replace_map: Option<&ReplaceMap>,
    ) -> Result<(CacheRef<Tensor>, Rc<Tensor>), CacheError> {
        let rank = form.rank();
        let parameters = FormCompilerParameters::from_parameters(form_compiler_parameters)?;
        let key = assemble_key(form, bcs, form_compiler_parameters);
        if let Some(entry) = self.cache.get_value(&key) {
            return Ok(entry);
        }

        let assemble_form = assembly_form(form, replace_map);
        let tensor = match rank {
            0 => {
                if !bcs.is_empty() {
                    return Err(CacheError::invalid_argument(
                        "Unexpected boundary conditions for rank 0 form",
                    ));
                }
                backend.assemble(&assemble_form, &parameters)?
            }
            1 => match backend.assemble(&assemble_form, &parameters)? {
                Tensor::Vector(mut b) => {
                    for bc in bcs {
                        if bc.space().dim() != b.len() {
                            return Err(CacheError::invalid_argument(format!(
                                "Boundary condition of dimension {} applied to vector of dimension {}",
                                bc.space().dim(),
                                b.len()
                            )));
                        }
                        bc.apply(&mut b);
                    }
                    Tensor::Vector(b)
                }
                other => return Err(eyre!("Backend returned a rank {} tensor for a linear form", other.rank()).into()),
            },
            2 => Tensor::Matrix(backend.assemble_matrix(&assemble_form, bcs, true, &parameters)?),
            rank => return Err(CacheError::UnsupportedRank(rank)),
        };

        debug!("Caching assembled rank {} form in cache {}", rank, self.cache.id().index());
        self.cache.insert_for_form(key, form, tensor)
    }
}

impl Deref for AssemblyCache {
    type Target = Cache<AssemblyKey, Tensor>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
