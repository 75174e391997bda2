use graphsync_presence::awareness::{
    AwarenessChannel, AwarenessListener, AwarenessState, ClientId, ListenerId,
};
use graphsync_presence::PresenceResult;
use mockall::mock;
use serde_json::Value;
use std::collections::BTreeMap;

// Mock implementation of the AwarenessChannel trait
mock! {
    pub AwarenessChannel {}

    impl AwarenessChannel for AwarenessChannel {
        fn client_id(&self) -> ClientId;
        fn set_local_state_field(&self, field: &str, value: Value) -> PresenceResult<()>;
        fn get_states(&self) -> BTreeMap<ClientId, AwarenessState>;
        fn on_change(&self, listener: AwarenessListener) -> ListenerId;
        fn off_change(&self, id: ListenerId);
    }
}
