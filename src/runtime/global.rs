//! Process-wide runtime state. One heap, one class registry, one classpath.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::runtime::{Class, class_loader::bootstrap::ClassSource, heap::Heap};

pub static HEAP: LazyLock<RwLock<Heap>> = LazyLock::new(|| RwLock::new(Heap::new()));

/// Binary name -> resolution cell. The cell is registered before the class is
/// linked so concurrent and cyclic resolution converge on one instance.
pub static CLASS_REGISTRY: LazyLock<DashMap<Arc<str>, Arc<OnceCell<Arc<Class>>>>> =
    LazyLock::new(DashMap::new);

/// Classpath entries, searched in order.
pub static CLASS_SOURCES: LazyLock<RwLock<Vec<Box<dyn ClassSource>>>> =
    LazyLock::new(|| RwLock::new(Vec::new()));
