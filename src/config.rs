use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

use crate::{
    engine::{FormulaEntry, FormulaSet},
    formula::FormulaParser,
    model::{AttributeHost, HolderRef},
    value::Value,
    workspace::Workspace,
    PathflowError,
};

/// Description of a workspace, as stored in a TOML file:
///
/// ```toml
/// [[containers]]
/// name = "Doc"
///
/// [[containers.holders]]
/// name = "B"
/// label = "Bracket"
/// links = ["A"]
/// attributes = { y = 0.0 }
///
/// [[containers.holders.formulas]]
/// path = "y"
/// formula = "A.x + 1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    #[serde(default)]
    pub holders: Vec<HolderRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderRecord {
    pub name: String,
    /// Defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Alias name -> target path relative to the holder.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<FormulaEntry>,
}

impl WorkspaceFile {
    pub fn from_toml(text: &str) -> Result<WorkspaceFile, PathflowError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, PathflowError> {
        Ok(toml::to_string(self)?)
    }

    /// Create the described workspace.
    ///
    /// Holders, attributes and aliases are created first, then links, then formulas, which go
    /// through the normal validation of [`crate::engine::ExpressionEngine::set_formula`].
    pub fn build(&self, parser: &dyn FormulaParser) -> Result<Workspace, PathflowError> {
        let workspace = Workspace::new();
        self.populate(&workspace, parser)?;
        Ok(workspace)
    }

    /// Add the described containers to an existing workspace.
    pub fn populate(
        &self,
        workspace: &Workspace,
        parser: &dyn FormulaParser,
    ) -> Result<(), PathflowError> {
        for container in &self.containers {
            workspace.add_container(&container.name)?;
            for record in &container.holders {
                let holder = workspace.add_holder(
                    &container.name,
                    &record.name,
                    record.label.as_deref().unwrap_or(&record.name),
                )?;
                for (attribute, value) in &record.attributes {
                    workspace.set_attribute(&holder, attribute, value.clone())?;
                }
                for (alias, target) in &record.aliases {
                    workspace.add_alias(&holder, alias, target)?;
                }
            }
        }
        for (holder, record) in self.holder_records() {
            for link in &record.links {
                workspace.link(&holder, link)?;
            }
        }
        for (holder, record) in self.holder_records() {
            if record.formulas.is_empty() {
                continue;
            }
            let engine = workspace.engine(&holder)?;
            engine.restore(workspace, parser, &FormulaSet::new(record.formulas.clone()))?;
        }
        tracing::debug!(
            "[Config] loaded {} containers into workspace",
            self.containers.len()
        );
        Ok(())
    }

    fn holder_records(&self) -> impl Iterator<Item = (HolderRef, &HolderRecord)> {
        self.containers.iter().flat_map(|container| {
            container
                .holders
                .iter()
                .map(|record| (HolderRef::new(container.name.clone(), record.name.clone()), record))
        })
    }

    /// Describe the current state of `workspace`.
    pub fn capture(workspace: &Workspace) -> WorkspaceFile {
        let containers = workspace
            .containers()
            .into_iter()
            .map(|container| {
                let holders = workspace
                    .holders(&container)
                    .into_iter()
                    .map(|entry| {
                        let holder = HolderRef::new(container.clone(), entry.name.clone());
                        let formulas = workspace
                            .existing_engine(&holder)
                            .map(|engine| engine.save().formulas)
                            .unwrap_or_default();
                        HolderRecord {
                            label: (entry.label != entry.name).then_some(entry.label),
                            name: entry.name,
                            links: workspace.links(&holder).into_iter().collect(),
                            aliases: workspace.aliases(&holder),
                            attributes: workspace.attributes(&holder),
                            formulas,
                        }
                    })
                    .collect();
                ContainerRecord {
                    name: container,
                    holders,
                }
            })
            .collect();
        WorkspaceFile { containers }
    }
}

/// Storage for a [`WorkspaceFile`].
pub trait WorkspaceProvider: Send + Sync {
    fn load(&self) -> Result<WorkspaceFile, PathflowError>;
    fn save(&self, file: &WorkspaceFile) -> Result<(), PathflowError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlWorkspaceProvider {
    path: PathBuf,
}

impl TomlWorkspaceProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TomlWorkspaceProvider {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkspaceProvider for TomlWorkspaceProvider {
    fn load(&self) -> Result<WorkspaceFile, PathflowError> {
        tracing::debug!("Attempting to read workspace from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Workspace file not found, returning empty workspace.");
            return Ok(WorkspaceFile::default());
        }
        let content = read_to_string(&self.path)?;
        WorkspaceFile::from_toml(&content)
    }

    fn save(&self, file: &WorkspaceFile) -> Result<(), PathflowError> {
        tracing::debug!("Attempting to write workspace to: {:?}", &self.path);
        write(&self.path, file.to_toml()?)?;
        Ok(())
    }
}
