//! Racing first lookups against a shared dispatcher.

use std::sync::{Arc, Barrier};
use std::thread;

use declarative_policy::{
    Dispatcher, PolicyCache, PolicyCatalog, PolicyClass, PolicyOptions, PolicySubject, Subject,
    SubjectType, BASE_POLICY,
};

const THREADS: usize = 16;

static WIDGET: SubjectType = SubjectType::new("Widget", &[]);
static GADGET: SubjectType = SubjectType::new("Gadget", &[&WIDGET]);
static ORPHAN: SubjectType = SubjectType::new("Orphan", &[]);

static WIDGET_POLICY: PolicyClass = PolicyClass::new("WidgetPolicy", &BASE_POLICY);

struct Item(&'static SubjectType);

impl PolicySubject for Item {
    fn subject_type(&self) -> &'static SubjectType {
        self.0
    }
}

fn dispatcher() -> Dispatcher {
    let catalog = PolicyCatalog::builder()
        .register(&WIDGET_POLICY)
        .build()
        .unwrap();
    Dispatcher::new(catalog)
}

#[test]
fn racing_first_lookup_computes_once() {
    let dispatcher = dispatcher();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let subject = Subject::object(Item(&GADGET));
                barrier.wait();
                dispatcher.class_for(&subject).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), &WIDGET_POLICY);
    }

    let stats = dispatcher.registry().stats();
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.entries, 1);
    assert!(stats.contended < THREADS as u64);
}

#[test]
fn racing_failed_lookup_computes_once() {
    let dispatcher = dispatcher();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let subject = Subject::object(Item(&ORPHAN));
                barrier.wait();
                dispatcher.class_for(&subject).is_err()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(dispatcher.registry().stats().computations, 1);
}

#[test]
fn per_thread_caches_stay_isolated() {
    let dispatcher = dispatcher();
    let subject = Subject::object(Item(&WIDGET));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let subject = subject.clone();
            thread::spawn(move || {
                let mut cache = PolicyCache::new();
                let first = dispatcher
                    .policy_for(None, &subject, PolicyOptions::with_cache(&mut cache))
                    .unwrap();
                let second = dispatcher
                    .policy_for(None, &subject, PolicyOptions::with_cache(&mut cache))
                    .unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                assert_eq!(cache.len(), 1);
                first.class()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), &WIDGET_POLICY);
    }
    assert_eq!(dispatcher.registry().stats().computations, 1);
}
