#![warn(missing_docs)]

//! Shader node graph resolver. Reads material definitions whose techniques are built from shader
//! nodes, checks their wiring and computes what a GLSL generator has to declare.

pub mod asset;
pub mod binding;
pub mod material;
pub mod shader;

/// Most used types, for glob imports.
pub mod prelude {
    pub use crate::{
        asset::{AssetLoader, DirectoryAssets, MemoryAssets},
        material::{read_material_def, MatParam, MaterialDef, VarType},
        shader::{
            definition::{LoadOptions, ShaderNodeDefinition, Stage},
            error::{Category, Error, ErrorKind, LoadResult},
            graph::{MappingSource, ShaderGenerationInfo, ShaderNode, VariableMapping},
            technique::TechniqueDef,
            variable::{Namespace, ShaderNodeVariable, VarId, Variables},
        },
        Building, Finalized,
    };
}

macro_rules! states {
    {$($(#[$attr:meta])* $state:ident),+ $(,)?} => {
        $(
            #[derive(Clone, Debug, Default)]
            $(#[$attr])*
            pub struct $state;
        )+
    };
}

states! {
    /// Building state where nodes, mappings and declarations are filled.
    Building,
    /// Conditions have been computed and the technique can be handed to a generator.
    Finalized,
}
