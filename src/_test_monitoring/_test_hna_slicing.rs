use crate::_test_monitoring::_test_util::*;
use crate::compilation::program::{compile_automaton, CompileOptions, Reduction};
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::hna_monitor::HnaMonitor;
use crate::evaluation::Verdict;
use crate::events::ActionEvent;
use crate::preprocessing::hna_automaton::{HypernodeAutomaton, HypernodeState};

use std::rc::Rc;

/// The cyclic three-node automaton `Clear → ShareLoc → EraseLoc → Clear`,
/// every node carrying the input-prefix formula.
fn cyclic_hna() -> HypernodeAutomaton {
    let mut hna = HypernodeAutomaton::new();
    let clear = hna.add_state(HypernodeState::new(
        "Clear",
        forall2(projection_prefix("in", "t1", "t2")),
    ));
    let share = hna.add_state(HypernodeState::new(
        "ShareLoc",
        forall2(projection_prefix("in", "t1", "t2")),
    ));
    let erase = hna.add_state(HypernodeState::new(
        "EraseLoc",
        forall2(projection_prefix("in", "t1", "t2")),
    ));
    hna.add_transition(clear, "share", share);
    hna.add_transition(share, "erase", erase);
    hna.add_transition(erase, "clear", clear);
    hna
}

fn monitor_for(hna: &HypernodeAutomaton) -> HnaMonitor {
    let opts = CompileOptions::new(schema_in_out())
        .with_alphabet(vec![0, 1, 2, 3])
        .with_reduction(Reduction {
            reflexive: false,
            symmetric: true,
        });
    let program = Rc::new(compile_automaton(hna, &opts).unwrap());
    HnaMonitor::new(program, Rc::new(FunctionRegistry::new())).unwrap()
}

fn event(input: i64) -> ActionEvent {
    ActionEvent::Event(schema_in_out().make_event(&[input, 0]).unwrap())
}

fn run(monitor: &mut HnaMonitor) -> Verdict {
    for _ in 0..256 {
        let verdict = monitor.step();
        if verdict.is_decisive() {
            return verdict;
        }
    }
    Verdict::Unknown
}

#[test]
/// Two traces sliced through the same nodes with compatible events on every
/// slice: every slice formula holds.
fn sliced_traces_accepted() {
    let hna = cyclic_hna();
    let mut monitor = monitor_for(&hna);
    let share = hna.action_id("share").unwrap();
    let erase = hna.action_id("erase").unwrap();

    monitor.open_trace(100).unwrap();
    monitor.open_trace(200).unwrap();
    assert_eq!(monitor.num_slices(), 1);

    // Clear segments: [0] and [0, 1]
    monitor.push(100, event(0)).unwrap();
    monitor.push(200, event(0)).unwrap();
    monitor.push(200, event(1)).unwrap();

    monitor.push(100, ActionEvent::Action(share)).unwrap();
    monitor.push(200, ActionEvent::Action(share)).unwrap();
    assert_eq!(monitor.num_slices(), 2);

    // ShareLoc segments: [2] and [2, 3]
    monitor.push(100, event(2)).unwrap();
    monitor.push(200, event(2)).unwrap();
    monitor.push(200, event(3)).unwrap();

    // only the first trace moves on to EraseLoc
    monitor.push(100, ActionEvent::Action(erase)).unwrap();
    assert_eq!(monitor.num_slices(), 3);
    monitor.push(100, event(1)).unwrap();

    assert_eq!(monitor.step(), Verdict::Unknown);

    monitor.close_trace(100).unwrap();
    monitor.close_trace(200).unwrap();
    monitor.close_input();
    assert_eq!(run(&mut monitor), Verdict::True);
}

#[test]
/// The events delivered to the ShareLoc slice diverge, violating the slice
/// formula while the Clear slice stays satisfied.
fn diverging_slice_rejected() {
    let hna = cyclic_hna();
    let mut monitor = monitor_for(&hna);
    let share = hna.action_id("share").unwrap();

    monitor.open_trace(100).unwrap();
    monitor.open_trace(200).unwrap();

    // compatible Clear segments
    monitor.push(100, event(0)).unwrap();
    monitor.push(200, event(0)).unwrap();

    monitor.push(100, ActionEvent::Action(share)).unwrap();
    monitor.push(200, ActionEvent::Action(share)).unwrap();

    // diverging ShareLoc segments: [1, 2] vs [1, 3]
    monitor.push(100, event(1)).unwrap();
    monitor.push(100, event(2)).unwrap();
    monitor.push(200, event(1)).unwrap();
    monitor.push(200, event(3)).unwrap();

    monitor.close_trace(100).unwrap();
    monitor.close_trace(200).unwrap();
    monitor.close_input();
    assert_eq!(run(&mut monitor), Verdict::False);
}

#[test]
/// The cycle closes: a trace travelling `share, erase, clear` ends in a new
/// Clear slice distinct from the root.
fn cycle_spawns_new_slice() {
    let hna = cyclic_hna();
    let mut monitor = monitor_for(&hna);
    let share = hna.action_id("share").unwrap();
    let erase = hna.action_id("erase").unwrap();
    let clear = hna.action_id("clear").unwrap();

    monitor.open_trace(7).unwrap();
    monitor.push(7, event(0)).unwrap();
    monitor.push(7, ActionEvent::Action(share)).unwrap();
    monitor.push(7, event(1)).unwrap();
    monitor.push(7, ActionEvent::Action(erase)).unwrap();
    monitor.push(7, event(2)).unwrap();
    monitor.push(7, ActionEvent::Action(clear)).unwrap();
    monitor.push(7, event(3)).unwrap();

    assert_eq!(monitor.num_slices(), 4);

    monitor.close_trace(7).unwrap();
    monitor.close_input();
    assert_eq!(run(&mut monitor), Verdict::True);
}

#[test]
/// An action without a transition retires the trace's slicing; further events
/// for the trace are rejected.
fn uncovered_action_retires_trace() {
    let hna = cyclic_hna();
    let mut monitor = monitor_for(&hna);
    let erase = hna.action_id("erase").unwrap();

    monitor.open_trace(1).unwrap();
    monitor.push(1, event(0)).unwrap();
    // Clear has no transition on "erase"
    monitor.push(1, ActionEvent::Action(erase)).unwrap();
    assert!(monitor.push(1, event(1)).is_err());
    assert_eq!(monitor.num_slices(), 1);

    monitor.close_input();
    assert_eq!(run(&mut monitor), Verdict::True);
}

#[test]
/// Actions of one trace do not affect the slicing of another.
fn independent_trace_routing() {
    let hna = cyclic_hna();
    let mut monitor = monitor_for(&hna);
    let share = hna.action_id("share").unwrap();

    monitor.open_trace(1).unwrap();
    monitor.open_trace(2).unwrap();
    monitor.push(1, ActionEvent::Action(share)).unwrap();

    // trace 2 still feeds the Clear slice, trace 1 feeds ShareLoc
    monitor.push(1, event(2)).unwrap();
    monitor.push(2, event(0)).unwrap();
    assert_eq!(monitor.num_slices(), 2);

    monitor.close_trace(1).unwrap();
    monitor.close_trace(2).unwrap();
    monitor.close_input();
    assert_eq!(run(&mut monitor), Verdict::True);
}
