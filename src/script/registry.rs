use std::collections::HashMap;
use tracing::warn;

use super::args::ArgSpec;

/// A script function: its names, declared arguments and what runs it.
#[derive(Debug)]
pub struct FunctionDescriptor<H: 'static> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub args: &'static [ArgSpec],
    pub handler: H,
}

/// Case-insensitive lookup over a static function table, aliases included.
/// Built once at startup and never changed.
pub struct FunctionRegistry<H: 'static> {
    table: &'static [FunctionDescriptor<H>],
    index: HashMap<String, usize>,
}

fn key(name: &str) -> String {
    name.trim_start_matches('$').to_lowercase()
}

impl<H> FunctionRegistry<H> {
    pub fn new(table: &'static [FunctionDescriptor<H>]) -> Self {
        let mut index = HashMap::new();
        for (position, descriptor) in table.iter().enumerate() {
            for name in std::iter::once(&descriptor.name).chain(descriptor.aliases) {
                if index.insert(key(name), position).is_some() {
                    warn!("⚠️ Function name ${} registered twice", name);
                }
            }
        }
        Self { table, index }
    }

    pub fn get(&self, name: &str) -> Option<&'static FunctionDescriptor<H>> {
        self.index.get(&key(name)).map(|&position| &self.table[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&key(name))
    }

    pub fn descriptors(&self) -> &'static [FunctionDescriptor<H>] {
        self.table
    }
}
