#![no_main]

use arbitrary::Arbitrary;
use bodesk_modal::{ModalConfiguration, ModalId, ModalStore};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Open(u8),
    Push(u8),
    Pop,
    Close,
    CloseAll,
    Flush,
    Title(u8, u16),
    GoTo(i8),
}

fuzz_target!(|ops: Vec<Op>| {
    let store: ModalStore = ModalStore::builder().first_id(1).build();
    let mut known: Vec<ModalId> = Vec::new();

    for op in ops.into_iter().take(256) {
        match op {
            Op::Open(tag) => known.push(store.open(ModalConfiguration::entity("e", tag.to_string()))),
            Op::Push(tag) => known.push(store.push(ModalConfiguration::entity("e", tag.to_string()))),
            Op::Pop => {
                store.pop();
            }
            Op::Close => store.close(),
            Op::CloseAll => store.close_all(),
            Op::Flush => {
                store.flush_pending_clear();
            }
            Op::Title(i, title) => {
                let target = known.get(usize::from(i)).copied();
                store.update_config(
                    bodesk_modal::ConfigPatch::new().title(title.to_string()),
                    target,
                );
            }
            Op::GoTo(index) => {
                store.go_to_step(isize::from(index), None);
            }
        }

        store.with_state(|s| {
            if let Some(active) = &s.active {
                if let Some(parent) = active.parent_id {
                    assert!(s.suspended.iter().any(|m| m.id == Some(parent)));
                }
            }
            let mut ids: Vec<_> = s.suspended.iter().chain(s.active.iter()).filter_map(|m| m.id).collect();
            let len = ids.len();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), len, "duplicate modal id on the stack");
        });
    }
});
