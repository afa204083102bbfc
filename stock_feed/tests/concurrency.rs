mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use common::{accept_all, harness};
use stock_common::StockItem;
use stock_feed::SymbolState;

const WORKERS: usize = 8;
const SYMBOLS_PER_WORKER: usize = 5;
const PUSHES: usize = 200;

fn symbol(worker: usize, index: usize) -> String {
    format!("S{}_{}", worker, index)
}

#[test]
fn concurrent_pushes_keep_last_value_per_symbol() {
    let h = Arc::new(harness(&["A", "B"], &[], accept_all));
    let items: Vec<StockItem> = (0..WORKERS)
        .flat_map(|w| (0..SYMBOLS_PER_WORKER).map(move |i| StockItem::from(symbol(w, i).as_str())))
        .collect();
    h.manager.set_stocks(&items).unwrap();

    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for n in 1..=PUSHES {
                    for i in 0..SYMBOLS_PER_WORKER {
                        h.adapter("A").push_price(&symbol(w, i), n as f64);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for w in 0..WORKERS {
        for i in 0..SYMBOLS_PER_WORKER {
            let record = h.manager.stock_data(&symbol(w, i)).unwrap().unwrap();
            assert_eq!(record.price, Some(PUSHES as f64));
        }
    }
    let changed = h.manager.stocks_changed_since_last_read().unwrap();
    assert_eq!(changed.len(), WORKERS * SYMBOLS_PER_WORKER);
}

#[test]
fn concurrent_failures_and_stock_lists_stay_consistent() {
    let h = Arc::new(harness(&["A", "B", "C"], &[], accept_all));
    let items: Vec<StockItem> = (0..SYMBOLS_PER_WORKER)
        .map(|i| StockItem::from(symbol(0, i).as_str()))
        .collect();
    h.manager.set_stocks(&items).unwrap();

    let pushers: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|provider| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for _ in 0..50 {
                    for i in 0..SYMBOLS_PER_WORKER {
                        h.adapter(provider).push_failure(&symbol(0, i));
                    }
                }
            })
        })
        .collect();
    let resetter = {
        let h = Arc::clone(&h);
        let items = items.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                h.manager.set_stocks(&items).unwrap();
            }
        })
    };
    for handle in pushers {
        handle.join().unwrap();
    }
    resetter.join().unwrap();

    let providers: HashSet<&str> = ["A", "B", "C"].into_iter().collect();
    for i in 0..SYMBOLS_PER_WORKER {
        let assignment = h.manager.assignment(&symbol(0, i)).unwrap().unwrap();
        assert!(assignment.current_index < assignment.fallback_chain.len());
        match h.manager.symbol_state(&symbol(0, i)).unwrap() {
            SymbolState::Assigned(p) => assert!(providers.contains(p.as_str())),
            SymbolState::Exhausted => assert_eq!(assignment.current_index, 2),
            SymbolState::Unassigned => panic!("symbol lost its assignment"),
        }
    }
}
