#![no_main]
use libfuzzer_sys::fuzz_target;
use routebot::graph::{feedback, ConversationState, InterruptRequest, Route};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut state) = serde_json::from_str::<ConversationState>(s) {
        let _ = state.next_route();
        if let Some(request) = feedback::pending_request(&state) {
            let _ = request.position();
        }
        let _ = feedback::on_satisfaction(&mut state, s);
    }
    let _ = serde_json::from_str::<InterruptRequest>(s);
    let _ = s.parse::<Route>();
    let _ = feedback::parse_satisfaction(s);
});
