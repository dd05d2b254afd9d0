use super::RveCatalog;
use crate::fem::{nnz_sup_truss, BufferArena};
use crate::network::NetworkTemplate;
use crate::StrError;

/// Holds the loaded templates of one RVE type
pub struct RveType {
    /// Type name (wire identifier of the assignment headers)
    pub name: String,

    /// Template pool; assignments pick one at random
    pub templates: Vec<NetworkTemplate>,
}

/// Holds every RVE network template a rank can instantiate
///
/// Templates are loaded once at startup, before the catalog handshake. The
/// library knows the largest DOF count across all templates and builds the
/// shared [`BufferArena`] from it, so every later instantiation is bounded
/// by startup-time allocation.
pub struct RveLibrary {
    types: Vec<RveType>,
}

impl RveLibrary {
    /// Allocates an empty library
    pub fn new() -> Self {
        RveLibrary { types: Vec::new() }
    }

    /// Registers an in-memory template pool under a type name
    pub fn register(&mut self, name: &str, templates: Vec<NetworkTemplate>) -> Result<(), StrError> {
        if templates.is_empty() {
            return Err("an RVE type needs at least one template");
        }
        if self.types.iter().any(|t| t.name == name) {
            return Err("the RVE type name is already registered");
        }
        self.types.push(RveType {
            name: name.to_string(),
            templates,
        });
        Ok(())
    }

    /// Loads a template pool from JSON files and registers it
    pub fn load_type_from_files(&mut self, name: &str, paths: &[&str]) -> Result<(), StrError> {
        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            templates.push(NetworkTemplate::read_json(path)?);
        }
        self.register(name, templates)
    }

    /// Returns the number of registered types
    pub fn n_types(&self) -> usize {
        self.types.len()
    }

    /// Returns the handshake catalog: (type name, template count) pairs
    pub fn catalog(&self) -> RveCatalog {
        RveCatalog {
            types: self.types.iter().map(|t| (t.name.clone(), t.templates.len())).collect(),
        }
    }

    /// Finds the index of a type by name
    pub fn type_index(&self, name: &str) -> Result<usize, StrError> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .ok_or("unknown RVE type")
    }

    /// Returns the number of templates of a type
    pub fn n_templates(&self, type_index: usize) -> usize {
        self.types[type_index].templates.len()
    }

    /// Returns one template of a type
    pub fn template(&self, type_index: usize, template_index: usize) -> &NetworkTemplate {
        &self.types[type_index].templates[template_index]
    }

    /// Returns the largest DOF count across all templates
    pub fn dof_max(&self) -> usize {
        self.types
            .iter()
            .flat_map(|t| t.templates.iter())
            .map(|tpl| tpl.nodes.len() * tpl.ndim)
            .max()
            .unwrap_or(0)
    }

    /// Builds the shared buffer arena sized to the largest template
    pub fn build_arena(&self) -> Result<BufferArena, StrError> {
        let neq_cap = self.dof_max();
        if neq_cap == 0 {
            return Err("cannot build the buffer arena for an empty library");
        }
        let nnz_cap = self
            .types
            .iter()
            .flat_map(|t| t.templates.iter())
            .map(|tpl| nnz_sup_truss(tpl.elements.len(), tpl.ndim, neq_cap))
            .max()
            .unwrap_or(neq_cap);
        BufferArena::new(neq_cap, nnz_cap)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::RveLibrary;
    use crate::base::SampleNetworks;
    use crate::network::NetworkTemplate;

    fn sample_library() -> RveLibrary {
        let mut library = RveLibrary::new();
        library
            .register(
                "cross",
                vec![
                    NetworkTemplate::from_network(&SampleNetworks::planar_cross_2d()),
                    NetworkTemplate::from_network(&SampleNetworks::asymmetric_2d()),
                ],
            )
            .unwrap();
        library
            .register(
                "star",
                vec![NetworkTemplate::from_network(&SampleNetworks::diagonal_star_3d())],
            )
            .unwrap();
        library
    }

    #[test]
    fn register_captures_errors() {
        let mut library = sample_library();
        assert_eq!(
            library.register("cross", vec![]).err(),
            Some("an RVE type needs at least one template")
        );
        let template = NetworkTemplate::from_network(&SampleNetworks::planar_cross_2d());
        assert_eq!(
            library.register("cross", vec![template]).err(),
            Some("the RVE type name is already registered")
        );
        assert_eq!(RveLibrary::new().build_arena().err(), Some("cannot build the buffer arena for an empty library"));
    }

    #[test]
    fn catalog_and_lookup_work() {
        let library = sample_library();
        assert_eq!(library.n_types(), 2);
        let catalog = library.catalog();
        assert_eq!(catalog.types, vec![("cross".to_string(), 2), ("star".to_string(), 1)]);
        let idx = library.type_index("star").unwrap();
        assert_eq!(library.n_templates(idx), 1);
        assert_eq!(library.template(idx, 0).ndim, 3);
        assert_eq!(library.type_index("nope").err(), Some("unknown RVE type"));
    }

    #[test]
    fn arena_is_sized_to_the_largest_template() {
        let library = sample_library();
        // the 3D star has 9 nodes: 27 DOFs dominate the 2D templates
        assert_eq!(library.dof_max(), 27);
        let arena = library.build_arena().unwrap();
        assert_eq!(arena.neq_cap(), 27);
        arena.require(27).unwrap();
        assert!(arena.require(28).is_err());
    }
}
