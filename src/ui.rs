use std::io::Write;

pub fn say(text: &str) {
    print!("\r\x1b[K\x1b[36m♪ {}\x1b[0m\n", text);
    std::io::stdout().flush().ok();
}

pub fn heard(text: &str) {
    print!("\r\x1b[K> {}\n", text);
    std::io::stdout().flush().ok();
}

pub fn listening() {
    print!("\r\x1b[K\x1b[90m● listening\x1b[0m\n");
    std::io::stdout().flush().ok();
}

pub fn thinking() {
    print!("\r\x1b[K\x1b[33m⠋ Thinking...\x1b[0m\n");
    std::io::stdout().flush().ok();
}

pub fn notice(text: &str) {
    print!("\r\x1b[K\x1b[90m{}\x1b[0m\n", text);
    std::io::stdout().flush().ok();
}

pub fn error(text: &str) {
    eprint!("\r\x1b[K\x1b[31m{}\x1b[0m\n", text);
}
