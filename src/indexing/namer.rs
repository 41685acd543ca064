//! Per-file naming pass.
//!
//! A [`FileNamer`] takes one [`FileAnalysis`] and gives every entity in it a
//! symbol, then rewrites the occurrences into a SCIP document. Each pass owns
//! its own [`LocalIdAllocator`], so local numbering always restarts at zero and
//! never depends on which thread handled the file.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use scip::types::{Document, Occurrence, SymbolInformation};

use super::analysis::{Entity, EntityId, FileAnalysis, Visibility};
use super::error::{IndexError, IndexResult};
use super::merge::PartialIndex;
use crate::package::{Owner, PackageRegistry};
use crate::project::ProjectIdentity;
use crate::symbol::{
    Descriptor, LocalIdAllocator, MAX_DESCRIPTOR_DEPTH, Symbol, SymbolBuilder, SymbolError,
};

/// Everything a naming pass needs that is shared across files.
#[derive(Debug, Clone)]
pub struct NamingContext {
    pub builder: SymbolBuilder,
    /// Package manager field of global symbols (`pypi`, `npm`).
    pub manager: String,
    pub project: ProjectIdentity,
    pub project_root: PathBuf,
    pub registry: Arc<PackageRegistry>,
}

impl NamingContext {
    pub fn new(
        builder: SymbolBuilder,
        manager: impl Into<String>,
        project: ProjectIdentity,
        project_root: impl Into<PathBuf>,
        registry: Arc<PackageRegistry>,
    ) -> Self {
        Self {
            builder,
            manager: manager.into(),
            project,
            project_root: project_root.into(),
            registry,
        }
    }
}

pub struct FileNamer<'a> {
    ctx: &'a NamingContext,
    locals: LocalIdAllocator,
    symbols: HashMap<EntityId, Symbol>,
}

impl<'a> FileNamer<'a> {
    pub fn new(ctx: &'a NamingContext) -> Self {
        Self {
            ctx,
            locals: LocalIdAllocator::new(),
            symbols: HashMap::new(),
        }
    }

    /// Name every entity of `analysis` and build its document.
    pub fn name(mut self, analysis: &FileAnalysis) -> IndexResult<PartialIndex> {
        let path = analysis.relative_path.as_str();

        let mut entities: HashMap<EntityId, &Entity> =
            HashMap::with_capacity(analysis.entities.len());
        for entity in &analysis.entities {
            if entities.insert(entity.id, entity).is_some() {
                return Err(IndexError::DuplicateEntity {
                    path: path.to_string(),
                    entity: entity.id,
                });
            }
        }

        for entity in &analysis.entities {
            self.symbol_for(analysis, &entities, entity.id)?;
        }

        let mut occurrences = Vec::with_capacity(analysis.occurrences.len());
        let mut defined: HashSet<EntityId> = HashSet::new();
        for occurrence in &analysis.occurrences {
            let symbol = self
                .symbols
                .get(&occurrence.entity)
                .ok_or_else(|| IndexError::UnknownEntity {
                    path: path.to_string(),
                    entity: occurrence.entity,
                })?;
            if !occurrence.has_valid_range() {
                return Err(IndexError::InvalidRange {
                    path: path.to_string(),
                    entity: occurrence.entity,
                    range: occurrence.range.clone(),
                });
            }
            if occurrence.is_definition() && symbol.is_global() {
                defined.insert(occurrence.entity);
            }

            occurrences.push(Occurrence {
                range: occurrence.range.clone(),
                symbol: symbol.to_string(),
                symbol_roles: occurrence.symbol_roles(),
                ..Default::default()
            });
        }

        let symbols: Vec<SymbolInformation> = analysis
            .entities
            .iter()
            .filter(|entity| defined.contains(&entity.id))
            .filter_map(|entity| {
                self.symbols.get(&entity.id).map(|symbol| SymbolInformation {
                    symbol: symbol.to_string(),
                    documentation: entity.documentation.clone(),
                    display_name: entity.name.clone(),
                    ..Default::default()
                })
            })
            .collect();

        tracing::debug!(
            "[namer] {}: {} entities, {} occurrences, {} locals",
            path,
            analysis.entities.len(),
            occurrences.len(),
            self.locals.issued()
        );

        Ok(PartialIndex::document(Document {
            language: analysis.language.clone(),
            relative_path: analysis.relative_path.clone(),
            occurrences,
            symbols,
            ..Default::default()
        }))
    }

    /// Symbol of `id`, naming its enclosing scopes first.
    fn symbol_for(
        &mut self,
        analysis: &FileAnalysis,
        entities: &HashMap<EntityId, &Entity>,
        id: EntityId,
    ) -> IndexResult<Symbol> {
        if let Some(symbol) = self.symbols.get(&id) {
            return Ok(symbol.clone());
        }

        let path = analysis.relative_path.as_str();

        // Walk outwards until a named scope or the package root.
        let mut chain: Vec<&Entity> = Vec::new();
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut current = Some(id);
        while let Some(next) = current {
            if self.symbols.contains_key(&next) {
                break;
            }
            let entity = entities.get(&next).ok_or_else(|| IndexError::UnknownEntity {
                path: path.to_string(),
                entity: next,
            })?;
            if !seen.insert(next) {
                return Err(scope_error(path, entity, "scope chain forms a cycle"));
            }
            if chain.len() > MAX_DESCRIPTOR_DEPTH {
                return Err(scope_error(
                    path,
                    entity,
                    format!("scope chain exceeds {MAX_DESCRIPTOR_DEPTH} levels"),
                ));
            }
            chain.push(entity);
            current = entity.scope;
        }

        let mut symbol = Symbol::empty();
        for entity in chain.into_iter().rev() {
            // locals have no owner to attribute
            if entity.visibility == Visibility::Local {
                symbol = self.locals.next_symbol();
                self.symbols.insert(entity.id, symbol.clone());
                continue;
            }

            let owner = match entity.scope {
                Some(scope) => self.symbols.get(&scope).cloned().unwrap_or_else(Symbol::empty),
                None => self.package_root(analysis, entity)?,
            };

            symbol = if !owner.is_global() {
                self.locals.next_symbol()
            } else {
                Descriptor::new(
                    entity.name.as_str(),
                    entity.kind,
                    entity.disambiguator.as_str(),
                )
                .and_then(|descriptor| self.ctx.builder.global(&owner, &descriptor))
                .map_err(|source| IndexError::Symbol {
                    path: path.to_string(),
                    source,
                })?
            };
            self.symbols.insert(entity.id, symbol.clone());
        }

        Ok(symbol)
    }

    /// Root symbol of the package that owns `entity`'s defining file.
    fn package_root(&self, analysis: &FileAnalysis, entity: &Entity) -> IndexResult<Symbol> {
        let file = match &entity.defined_in {
            Some(defined_in) => self.ctx.project_root.join(defined_in),
            None => self.ctx.project_root.join(&analysis.relative_path),
        };

        let owner = self
            .ctx
            .registry
            .resolve(&file)
            .map_err(|source| IndexError::Package {
                path: analysis.relative_path.clone(),
                source,
            })?;

        let (name, version) = match owner {
            Owner::Project => (
                self.ctx.project.name.as_str(),
                self.ctx.project.version.as_str(),
            ),
            Owner::Package(package) => (package.name.as_str(), package.version.as_str()),
        };
        Ok(self.ctx.builder.package(&self.ctx.manager, name, version))
    }
}

fn scope_error(path: &str, entity: &Entity, reason: impl Into<String>) -> IndexError {
    IndexError::Symbol {
        path: path.to_string(),
        source: SymbolError::grammar(&entity.name, reason),
    }
}
