fn main() {
    class2d_pipeline::cli::run();
}
