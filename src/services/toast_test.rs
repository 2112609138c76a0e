use super::*;
use tokio::time::{Instant, sleep, timeout};

const HIDE_AFTER: Duration = Duration::from_secs(4);

fn toast() -> (Toast, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(8);
    (Toast::new(tx, HIDE_AFTER), rx)
}

#[test]
fn level_wire_names() {
    assert_eq!(Level::Info.as_str(), "info");
    assert_eq!(Level::Success.as_str(), "success");
    assert_eq!(Level::Warning.as_str(), "warning");
    assert_eq!(Level::Error.as_str(), "error");
}

#[tokio::test(start_paused = true)]
async fn starts_idle() {
    let (toast, mut rx) = toast();
    assert_eq!(toast.state(), ToastState::Idle);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn show_pushes_frame_and_hides_after_duration() {
    let (toast, mut rx) = toast();
    let start = Instant::now();

    toast.show("Saved", Level::Success);
    let shown = rx.recv().await.expect("show frame");
    assert_eq!(shown.syscall, "toast:show");
    assert_eq!(shown.str_field("message"), "Saved");
    assert_eq!(shown.str_field("level"), "success");
    assert_eq!(toast.state(), ToastState::Showing { message: "Saved".into(), level: Level::Success });

    sleep(Duration::from_millis(3_900)).await;
    assert!(rx.try_recv().is_err(), "hidden too early");

    let hidden = rx.recv().await.expect("hide frame");
    assert_eq!(hidden.syscall, "toast:hide");
    assert!(start.elapsed() >= HIDE_AFTER);
    assert_eq!(toast.state(), ToastState::Idle);
}

#[tokio::test(start_paused = true)]
async fn second_show_restarts_the_timer() {
    let (toast, mut rx) = toast();
    let start = Instant::now();

    toast.show("first", Level::Info);
    rx.recv().await.expect("first show");

    sleep(Duration::from_secs(3)).await;
    toast.show("second", Level::Warning);
    let shown = rx.recv().await.expect("second show");
    assert_eq!(shown.str_field("message"), "second");

    sleep(Duration::from_secs(3)).await;
    assert!(rx.try_recv().is_err(), "first timer should have been cancelled");
    assert_eq!(toast.state(), ToastState::Showing { message: "second".into(), level: Level::Warning });

    let hidden = rx.recv().await.expect("hide frame");
    assert_eq!(hidden.syscall, "toast:hide");
    assert!(start.elapsed() >= Duration::from_secs(7));

    assert!(
        timeout(Duration::from_secs(10), rx.recv()).await.is_err(),
        "exactly one hide per visible toast"
    );
}
