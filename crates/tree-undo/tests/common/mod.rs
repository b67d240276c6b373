//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use serde_json::Value;
use tree_dom::{node_from_value, node_to_value, Node};

pub fn tree(value: Value) -> Node {
    node_from_value(&value).expect("fixture must be valid jsonml")
}

/// Structural equality ignoring empty text nodes and text-run splits, with
/// readable output on failure.
pub fn assert_tree_eq(actual: &Node, expected: &Node) {
    assert!(
        actual.is_equal_node_modulo_empty_text(expected),
        "trees differ\n  actual:   {}\n  expected: {}",
        node_to_value(actual),
        node_to_value(expected),
    );
}

/// Small deterministic generator for the seeded suites.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Lcg {
        Lcg(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    pub fn below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be positive");
        ((self.next_u64() >> 33) as usize) % bound
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }

    pub fn chance(&mut self, one_in: usize) -> bool {
        self.below(one_in) == 0
    }
}
