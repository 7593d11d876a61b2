//! Shader entry points and their dependency ordering.

use smallvec::SmallVec;

use super::blocks::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgrammableGraphicsStage {
    Vertex,
    Fragment,
}

impl ProgrammableGraphicsStage {
    pub const ALL: [Self; 2] = [Self::Vertex, Self::Fragment];

    /// Lowercase name used for WGSL attributes and wrapper functions.
    #[must_use]
    pub fn wgsl_name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }

    /// Capitalized name used for stage-level variables.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Vertex => "Vertex",
            Self::Fragment => "Fragment",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// The owning entry point runs before the named one
    Before,
    /// The owning entry point runs after the named one
    After,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedDependency {
    pub name: String,
    pub ty: DependencyType,
}

impl NamedDependency {
    pub fn new(name: impl Into<String>, ty: DependencyType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A named, stage-tagged unit of shader code contributed by a feature.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub name: String,
    pub stage: ProgrammableGraphicsStage,
    pub code: Block,
    pub dependencies: SmallVec<[NamedDependency; 2]>,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, stage: ProgrammableGraphicsStage, code: Block) -> Self {
        Self {
            name: name.into(),
            stage,
            code,
            dependencies: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.dependencies
            .push(NamedDependency::new(name, DependencyType::After));
        self
    }

    #[must_use]
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.dependencies
            .push(NamedDependency::new(name, DependencyType::Before));
        self
    }
}

/// Raised when entry point dependencies form a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    /// Entry points that could not be ordered
    pub involved: Vec<String>,
}

/// Orders entry points so every dependency runs first.
///
/// Dependencies naming an entry point that is not in `entry_points` are
/// ignored. Among entry points that are ready at the same time the input order
/// is kept.
pub fn sort_entry_points(entry_points: &mut Vec<&EntryPoint>) -> Result<(), DependencyCycle> {
    let count = entry_points.len();

    let resolve = |name: &str| -> Option<usize> {
        // Last declaration wins for duplicate names.
        entry_points
            .iter()
            .rposition(|ep| !ep.name.is_empty() && ep.name == name)
    };

    // dependents[i] lists nodes that must run after i
    let mut dependents: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); count];
    let mut pending = vec![0usize; count];

    for (index, entry_point) in entry_points.iter().enumerate() {
        for dep in &entry_point.dependencies {
            let Some(other) = resolve(&dep.name) else {
                continue;
            };
            let (first, then) = match dep.ty {
                DependencyType::Before => (index, other),
                DependencyType::After => (other, index),
            };
            dependents[first].push(then);
            pending[then] += 1;
        }
    }

    let mut sorted = Vec::with_capacity(count);
    let mut emitted = vec![false; count];
    while sorted.len() < count {
        let Some(next) = (0..count).find(|&i| !emitted[i] && pending[i] == 0) else {
            let involved = (0..count)
                .filter(|&i| !emitted[i])
                .map(|i| entry_points[i].name.clone())
                .collect();
            return Err(DependencyCycle { involved });
        };

        emitted[next] = true;
        sorted.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
        }
    }

    let unsorted = std::mem::take(entry_points);
    entry_points.extend(sorted.into_iter().map(|i| unsorted[i]));
    Ok(())
}
