use chainfs::shell::start_shell;

fn main() {
    env_logger::init();
    start_shell();
}
