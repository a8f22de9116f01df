//! Testable Property 1: compile -> describe -> recompile is an isomorphism.
//!
//! Each case compiles a source string, renders it back with `describe`,
//! recompiles the rendered text, and checks the recompiled `Setting`
//! resolves the same bindings as the original.

use std::collections::HashSet;

use yamy::command::CommandId;
use yamy::config::compiler::Compiler;
use yamy::config::{Action, Modifier, ModifiedKey, ModifierType};

struct NoIncludes;
impl yamy::config::compiler::FileLoader for NoIncludes {
    fn load(&self, _: &str, _: Option<&str>) -> Option<(String, String)> {
        None
    }
}

fn compile(src: &str) -> yamy::config::Setting {
    Compiler::new(&NoIncludes)
        .compile(src, HashSet::new())
        .unwrap_or_else(|e| panic!("source failed to compile: {e:?}\n---\n{src}"))
}

fn round_trip(setting: &yamy::config::Setting) -> yamy::config::Setting {
    let described = yamy::config::compiler::describe(setting);
    Compiler::new(&NoIncludes)
        .compile(&described, HashSet::new())
        .unwrap_or_else(|e| panic!("describe() output failed to recompile: {e:?}\n---\n{described}"))
}

#[test]
fn simple_remap_survives_a_round_trip() {
    let setting = compile("def key A = 0x1e\ndef key B = 0x30\nkey A = B\n");
    let recompiled = round_trip(&setting);

    let a = recompiled.keyboard.find_by_name("A").unwrap();
    let b = recompiled.keyboard.find_by_name("B").unwrap();
    let global = recompiled.global_keymap();
    let km = recompiled.keymaps.get(global);
    let seq_id = km
        .search_assignment(ModifiedKey::new(a, Modifier::none()), &recompiled.keyboard)
        .expect("A should still be bound");
    let seq = recompiled.keyseqs.get(seq_id);
    assert!(matches!(seq.actions[0], Action::Key(mk) if mk.key == b));
}

#[test]
fn named_keymap_bindings_survive_a_round_trip() {
    let setting = compile(
        "def key A = 0x1e\ndef key B = 0x30\ndef key C = 0x2e\n\
         keymap Other\n\
         key A = B\n\
         key B = C\n",
    );
    let recompiled = round_trip(&setting);

    let other = recompiled
        .keymaps
        .find_by_name("Other")
        .expect("named keymap should survive");
    let a = recompiled.keyboard.find_by_name("A").unwrap();
    let b = recompiled.keyboard.find_by_name("B").unwrap();
    let km = recompiled.keymaps.get(other);
    let seq_id = km
        .search_assignment(ModifiedKey::new(a, Modifier::none()), &recompiled.keyboard)
        .expect("A should still be bound in Other");
    let seq = recompiled.keyseqs.get(seq_id);
    assert!(matches!(seq.actions[0], Action::Key(mk) if mk.key == b));
}

#[test]
fn modifier_prefixed_binding_survives_a_round_trip() {
    let setting = compile("def key A = 0x1e\ndef key X = 0x2d\nmod shift = A\nkey S-X = X\n");
    let recompiled = round_trip(&setting);

    let x = recompiled.keyboard.find_by_name("X").unwrap();
    let global = recompiled.global_keymap();
    let km = recompiled.keymaps.get(global);
    let mut probe = Modifier::none();
    probe.press(ModifierType::Shift);
    assert!(km
        .search_assignment(ModifiedKey::new(x, probe), &recompiled.keyboard)
        .is_some());

    let mut unmodified = Modifier::none();
    unmodified.release(ModifierType::Shift);
    assert!(km
        .search_assignment(ModifiedKey::new(x, unmodified), &recompiled.keyboard)
        .is_none());
}

#[test]
fn modifier_prefixed_binding_matches_with_an_unrelated_lock_bit_held() {
    let setting = compile("def key A = 0x1e\ndef key X = 0x2d\nmod shift = A\nkey S-X = X\n");
    let recompiled = round_trip(&setting);

    let x = recompiled.keyboard.find_by_name("X").unwrap();
    let global = recompiled.global_keymap();
    let km = recompiled.keymaps.get(global);

    // CapsLock toggled on is unrelated to an `S-X` binding; an unmentioned
    // bit in the binding's left-hand side defaults to don't-care, so it
    // must not block the match just because the binding never mentioned it.
    let mut probe = Modifier::none();
    probe.press(ModifierType::Shift);
    probe.press(ModifierType::CapsLock);
    assert!(km
        .search_assignment(ModifiedKey::new(x, probe), &recompiled.keyboard)
        .is_some());
}

#[test]
fn function_command_survives_a_round_trip() {
    let setting = compile("def key A = 0x1e\nkey A = &Wait(100)\n");
    let recompiled = round_trip(&setting);

    let a = recompiled.keyboard.find_by_name("A").unwrap();
    let global = recompiled.global_keymap();
    let km = recompiled.keymaps.get(global);
    let seq_id = km
        .search_assignment(ModifiedKey::new(a, Modifier::none()), &recompiled.keyboard)
        .expect("A should still be bound");
    let seq = recompiled.keyseqs.get(seq_id);
    assert!(matches!(
        seq.actions[0],
        Action::Function { cmd: CommandId::Wait, .. }
    ));
}

#[test]
fn chained_keyseq_references_survive_a_round_trip() {
    let setting = compile(
        "def key A = 0x1e\ndef key B = 0x30\ndef key C = 0x2e\n\
         keyseq $inner = B C\n\
         key A = $inner\n",
    );
    let recompiled = round_trip(&setting);

    let a = recompiled.keyboard.find_by_name("A").unwrap();
    let b = recompiled.keyboard.find_by_name("B").unwrap();
    let c = recompiled.keyboard.find_by_name("C").unwrap();
    let global = recompiled.global_keymap();
    let km = recompiled.keymaps.get(global);
    let seq_id = km
        .search_assignment(ModifiedKey::new(a, Modifier::none()), &recompiled.keyboard)
        .expect("A should still be bound");
    let seq = recompiled.keyseqs.get(seq_id);
    // The binding's own rhs is a 1-action wrapper pointing at the named
    // `$inner` sequence; follow it to reach the B/C pair.
    assert_eq!(seq.actions.len(), 1);
    let Action::KeySeq(inner_id) = seq.actions[0] else {
        panic!("expected a KeySeq reference, got {:?}", seq.actions[0]);
    };
    let inner = recompiled.keyseqs.get(inner_id);
    assert_eq!(inner.actions.len(), 2);
    assert!(matches!(inner.actions[0], Action::Key(mk) if mk.key == b));
    assert!(matches!(inner.actions[1], Action::Key(mk) if mk.key == c));
}
