fn main() {
    std::process::exit(longrun::run());
}
