//! Access to external shader node definition files.

use crate::shader::{
    definition::{read_definitions, LoadOptions, ShaderNodeDefinition},
    error::{ErrorKind, LoadResult},
    parsing::read_statements,
};

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;

/// Provides the definitions referenced by `Definition: <Name> : <path>` lines.
pub trait AssetLoader {
    /// Load every definition declared in the file at `path`.
    fn load_definitions(
        &mut self,
        path: &str,
        options: LoadOptions,
    ) -> LoadResult<Vec<ShaderNodeDefinition>>;
}

/// Errors inside a definition file are reported as [ErrorKind::Asset] so their location stays
/// attached to the file path.
fn parse_definitions(
    path: &str,
    text: &str,
    options: LoadOptions,
) -> LoadResult<Vec<ShaderNodeDefinition>> {
    read_definition_file(text, options)
        .map(|definitions| {
            debug!("Loaded {} definition(s) from `{path}`", definitions.len());
            definitions
        })
        .map_err(|err| {
            ErrorKind::Asset {
                path: path.to_owned(),
                reason: err.to_string(),
            }
            .into()
        })
}

fn read_definition_file(text: &str, options: LoadOptions) -> LoadResult<Vec<ShaderNodeDefinition>> {
    let statements = read_statements(text)?;
    let mut definitions = vec![];

    for statement in statements.iter() {
        if statement.keyword() != "ShaderNodeDefinitions" {
            return Err(ErrorKind::UnexpectedStatement {
                expected: "ShaderNodeDefinitions",
                got: statement.keyword().to_owned(),
            }
            .at(statement));
        }

        definitions.extend(read_definitions(&statement.contents, options)?);
    }

    Ok(definitions)
}

#[derive(Clone, Debug, Default)]
/// Definition files kept in memory, keyed by path.
pub struct MemoryAssets {
    files: HashMap<String, String>,
}

impl MemoryAssets {
    /// Create a store from `(path, contents)` pairs.
    pub fn new(files: HashMap<String, String>) -> Self {
        Self { files }
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, contents: &str) {
        self.files.insert(path.to_owned(), contents.to_owned());
    }
}

impl AssetLoader for MemoryAssets {
    fn load_definitions(
        &mut self,
        path: &str,
        options: LoadOptions,
    ) -> LoadResult<Vec<ShaderNodeDefinition>> {
        let text = self.files.get(path).ok_or_else(|| ErrorKind::Asset {
            path: path.to_owned(),
            reason: "not found".to_owned(),
        })?;

        parse_definitions(path, text, options)
    }
}

#[derive(Clone, Debug)]
/// Definition files read from a directory, asset paths being relative to it.
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    /// Resolve assets relative to `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl AssetLoader for DirectoryAssets {
    fn load_definitions(
        &mut self,
        path: &str,
        options: LoadOptions,
    ) -> LoadResult<Vec<ShaderNodeDefinition>> {
        let text = fs::read_to_string(self.root.join(path)).map_err(|err| ErrorKind::Asset {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

        parse_definitions(path, &text, options)
    }
}
