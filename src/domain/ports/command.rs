/// Device logic receiving `set` commands.
///
/// Called on the same context as the dispatcher tick, must not block.
pub trait CommandHandler {
    fn handle_command(&mut self, location: &str, device: &str, value: &str);
}

impl<F> CommandHandler for F
where
    F: FnMut(&str, &str, &str),
{
    fn handle_command(&mut self, location: &str, device: &str, value: &str) {
        self(location, device, value);
    }
}
