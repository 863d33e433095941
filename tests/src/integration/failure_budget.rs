//! # Poll Failure Budget
//!
//! The spawned scheduler against a scripted network: consecutive failures
//! end the loop once they reach the threshold, a success resets the count,
//! and a stop request is honoured between cycles.

#[cfg(test)]
mod tests {
    use super::super::fixture::relay;
    use nr_04_poll_scheduler::{NetworkError, SchedulerError, SchedulerExit, SchedulerState};
    use std::time::Duration;
    use tokio::time::timeout;

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_threshold_ends_loop_and_fires_fatal_once() {
        let relay = relay();
        relay.connect().await;
        relay
            .network
            .set_fallback(Err(NetworkError::Unreachable("gw1".into())));

        let mut handle = relay.services.scheduler().spawn();
        let fatal = handle.take_fatal().unwrap();
        assert!(handle.take_fatal().is_none());
        let status = handle.subscribe_status();

        let error = timeout(DEADLINE, fatal).await.unwrap().unwrap();
        assert!(matches!(
            error,
            SchedulerError::ThresholdReached { failures: 3, .. }
        ));

        let exit = timeout(DEADLINE, handle.wait()).await.unwrap();
        assert_eq!(exit, SchedulerExit::Fatal(error));
        assert_eq!(status.borrow().state, SchedulerState::Failed);
        assert_eq!(relay.network.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_topology_spends_the_budget() {
        let relay = relay();

        let handle = relay.services.scheduler().spawn();
        let exit = timeout(DEADLINE, handle.wait()).await.unwrap();

        match exit {
            SchedulerExit::Fatal(SchedulerError::ThresholdReached { last_error, .. }) => {
                assert!(last_error.contains("No topology"));
            }
            other => panic!("unexpected exit: {:?}", other),
        }
        assert_eq!(relay.network.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let relay = relay();
        relay.connect().await;
        let down = || NetworkError::Timeout;
        relay.network.push_error(down());
        relay.network.push_error(down());
        relay.network.push_hits(Vec::new());
        relay.network.push_error(down());
        relay.network.push_error(down());

        let handle = relay.services.scheduler().spawn();
        let mut status = handle.subscribe_status();
        timeout(
            DEADLINE,
            status.wait_for(|s| s.polls_completed >= 2),
        )
        .await
        .unwrap()
        .unwrap();

        let exit = timeout(DEADLINE, handle.shutdown()).await.unwrap();
        assert_eq!(exit, SchedulerExit::Stopped);
        assert!(relay.network.poll_count() >= 6);
    }

    #[tokio::test]
    async fn test_stop_is_honoured_between_cycles() {
        let relay = relay();
        relay.connect().await;

        let handle = relay.services.scheduler().spawn();
        let mut status = handle.subscribe_status();
        timeout(DEADLINE, status.wait_for(|s| s.polls_completed >= 1))
            .await
            .unwrap()
            .unwrap();

        handle.stop();
        let final_state = timeout(DEADLINE, status.wait_for(|s| s.state.is_terminal()))
            .await
            .unwrap()
            .unwrap()
            .state;
        assert_eq!(final_state, SchedulerState::Stopped);
        assert_eq!(
            timeout(DEADLINE, handle.wait()).await.unwrap(),
            SchedulerExit::Stopped
        );
    }
}
