use arena_mirror::{
    color_of, Batch, Color, CoreMirror, InboundMessage, ThreadId, ThreadMove, ThreadRegistry,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const CORE_SIZE: usize = 32;

fn random_move(rng: &mut SmallRng) -> ThreadMove {
    ThreadMove {
        id: ThreadId::from(rng.gen_range(0..12i64)),
        // a few locations land outside the core on purpose
        location: rng.gen_range(-2..CORE_SIZE as i64 + 2),
        color: color_of(rng.gen()),
    }
}

#[test]
fn random_moves_and_kills_keep_the_index_consistent() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut registry = ThreadRegistry::with_core_size(CORE_SIZE);

    for step in 0..2_000 {
        if rng.gen_bool(0.2) {
            let id = ThreadId::from(rng.gen_range(0..12i64));
            registry.apply_kill(&id);
            assert!(registry.entry(&id).is_none());
        } else {
            let mv = random_move(&mut rng);
            let id = mv.id.clone();
            let in_core = (0..CORE_SIZE as i64).contains(&mv.location);
            registry.apply_moves([mv.clone()]);
            if in_core {
                assert_eq!(registry.location_of(&id), Some(mv.location as usize));
                assert_eq!(registry.resolve(mv.location as usize), Some(&mv.color));
            }
        }
        if let Err(violation) = registry.check_invariants() {
            panic!("step {}: {}", step, violation);
        }
    }

    let placed = registry.placed().count();
    assert_eq!(placed + registry.orphan_count(), registry.len());
    let occupied = (0..CORE_SIZE)
        .filter(|slot| registry.occupant(*slot).is_some())
        .count();
    assert_eq!(occupied, placed);
}

#[test]
fn kill_after_displacement_leaves_the_new_occupant() {
    let mut mirror = CoreMirror::default();
    mirror.apply(InboundMessage::Snapshot(vec![0; 4]));
    let a = ThreadId::from("a");
    let b = ThreadId::from("b");
    let moves = vec![
        ThreadMove {
            id: a.clone(),
            location: 1,
            color: Color::from("#a00"),
        },
        ThreadMove {
            id: b.clone(),
            location: 1,
            color: Color::from("#0b0"),
        },
    ];
    mirror.apply(InboundMessage::ThreadMoves(Batch::new(moves)));
    assert!(mirror.threads().is_orphaned(&a));

    mirror.apply(InboundMessage::ThreadKills(Batch::new(vec![a.clone()])));
    assert_eq!(mirror.occupant(1), Some(&b));
    assert_eq!(mirror.effective_color(1), Some(Color::from("#0b0")));
    assert!(mirror.threads().check_invariants().is_ok());
}

#[test]
fn same_seed_produces_the_same_digest() {
    fn churn(seed: u64) -> u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut mirror = CoreMirror::default();
        mirror.apply(InboundMessage::Snapshot(vec![0; CORE_SIZE]));
        for _ in 0..500 {
            let moves = (0..rng.gen_range(1..4)).map(|_| random_move(&mut rng)).collect();
            mirror.apply(InboundMessage::ThreadMoves(Batch::new(moves)));
        }
        mirror.digest()
    }

    assert_eq!(churn(11), churn(11));
    assert_ne!(churn(11), churn(12));
}
