//! Scheduling policy tests
//!
//! Realtime quantum accounting, realtime-over-best-effort preemption and
//! best-effort FCFS ordering.

use core_types::{Priority, ProcessClass, ProcessState};
use sim_kernel::{PreemptionReason, ScheduleEvent};
use tests_scheduling::Harness;

fn straight_line(adds: usize) -> String {
    let mut source = String::from(".code\n");
    for _ in 0..adds {
        source.push_str("ADD #1\n");
    }
    source.push_str(".endcode\n");
    source
}

#[test]
fn test_realtime_runs_exactly_quantum_steps() {
    for quantum in 1..=4 {
        let mut harness = Harness::with_quantum(quantum);
        let id = harness.spawn(&straight_line(20), 0, ProcessClass::Realtime, Priority::High);

        harness.run(quantum as usize);
        let process = harness.table.process(id).unwrap();
        assert_eq!(process.cpu().accumulator() as i64, quantum);
        assert_eq!(process.quantum_left(), 1);

        // The next advance drains the quantum and schedule() demotes it
        harness.table.advance_time();
        assert_eq!(harness.table.process(id).unwrap().quantum_left(), 0);
        harness.scheduler.schedule(&mut harness.table);

        let expected = ScheduleEvent::ProcessPreempted {
            process_id: id,
            reason: PreemptionReason::QuantumExpired,
            timestamp_ticks: quantum as u64 + 1,
        };
        assert!(harness.scheduler.audit_log().contains(&expected));
        assert_eq!(harness.dispatch_count(id), 2);
    }
}

#[test]
fn test_realtime_arrival_preempts_without_latency() {
    let mut harness = Harness::new();
    let be = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);
    let rt = harness.spawn_spinner(3, ProcessClass::Realtime, Priority::Low);

    assert_eq!(harness.run(2), vec![Some(be), Some(be)]);

    // Tick 3 admits rt; the same schedule() call must hand it the CPU
    assert_eq!(harness.tick(), Some(rt));
    assert_eq!(harness.state(be), ProcessState::Ready);
    assert_eq!(harness.state(rt), ProcessState::Running);
    assert_eq!(harness.running_count(), 1);
}

#[test]
fn test_realtime_does_not_preempt_realtime() {
    let mut harness = Harness::with_quantum(5);
    let low = harness.spawn_spinner(0, ProcessClass::Realtime, Priority::Low);
    let high = harness.spawn_spinner(2, ProcessClass::Realtime, Priority::High);

    let schedule = harness.run(6);
    assert_eq!(&schedule[..5], &[Some(low); 5]);
    assert_eq!(schedule[5], Some(high));
}

#[test]
fn test_best_effort_is_fcfs_by_arrival() {
    let mut harness = Harness::new();
    let late = harness.spawn_spinner(1, ProcessClass::BestEffort, Priority::High);
    let early = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);

    // Both are admitted on tick 1; arrival order beats creation order
    assert_eq!(harness.tick(), Some(early));
    assert_eq!(harness.run(20), vec![Some(early); 20]);
    assert_eq!(harness.state(late), ProcessState::Ready);
}

#[test]
fn test_best_effort_priority_ignored() {
    let mut harness = Harness::new();
    let first = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);
    harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::High);

    assert_eq!(harness.tick(), Some(first));
}

#[test]
fn test_best_effort_resumes_after_realtime_finishes() {
    let mut harness = Harness::new();
    let be = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);
    let rt = harness.spawn(".code\nSYSCALL 0\n.endcode", 2, ProcessClass::Realtime, Priority::High);
    harness.install_basic_syscalls(rt);

    assert_eq!(harness.run(3), vec![Some(be), Some(rt), Some(be)]);
    assert_eq!(harness.state(rt), ProcessState::Exit);
}

#[test]
fn test_counters_follow_state() {
    let mut harness = Harness::new();
    let runner = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);
    let waiter = harness.spawn_spinner(0, ProcessClass::BestEffort, Priority::Low);

    harness.run(10);

    let runner = harness.table.process(runner).unwrap();
    let waiter = harness.table.process(waiter).unwrap();
    // Admitted as ready on tick 1, running from tick 2 onwards
    assert_eq!(runner.waiting_time(), 1);
    assert_eq!(runner.execution_time(), 9);
    assert_eq!(waiter.waiting_time(), 10);
    assert_eq!(waiter.execution_time(), 0);
}

#[test]
fn test_at_most_one_running() {
    let mut harness = Harness::with_quantum(2);
    let printer = ".code\nloop: ADD #1\nSYSCALL 1\nBRANY loop\n.endcode";
    let mut realtime = Vec::new();
    let mut best_effort = Vec::new();
    for (arrival, class, priority) in [
        (0, ProcessClass::BestEffort, Priority::Low),
        (1, ProcessClass::Realtime, Priority::Low),
        (2, ProcessClass::Realtime, Priority::High),
        (3, ProcessClass::BestEffort, Priority::High),
    ] {
        let id = harness.spawn(printer, arrival, class, priority);
        // Long blocks leave gaps between realtime bursts
        harness.table.set_syscall_handler(
            id,
            Box::new(|code: i32, cpu: &mut vcpu::CpuHandle<'_>| {
                if code == 1 {
                    cpu.request_block(8);
                }
            }),
        );
        if class.is_realtime() {
            realtime.push(id);
        } else {
            best_effort.push(id);
        }
    }

    for _ in 0..100 {
        harness.tick();
        assert!(harness.running_count() <= 1);
    }
    for id in realtime {
        assert!(harness.dispatch_count(id) > 1);
    }
    for id in best_effort {
        assert!(harness.dispatch_count(id) > 0);
        assert!(harness.table.process(id).unwrap().execution_time() > 0);
    }
}

#[test]
fn test_set_quantum_applies_to_next_dispatch() {
    let mut harness = Harness::with_quantum(2);
    let id = harness.spawn_spinner(0, ProcessClass::Realtime, Priority::High);

    harness.tick();
    harness.scheduler.set_quantum(4);
    assert_eq!(harness.table.process(id).unwrap().quantum_left(), 2);

    // Quantum of 2 still expires on tick 3; the redispatch gets 4
    harness.run(2);
    assert_eq!(harness.dispatch_count(id), 2);
    assert_eq!(harness.table.process(id).unwrap().quantum_left(), 4);
}
