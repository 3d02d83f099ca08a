// wristhub — Runtime Tasks
//
// The producer runs on its own thread; the consumer loop runs wherever the
// host runtime lives.

pub mod idle;
pub mod sensor;
