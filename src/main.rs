fn main() -> anyhow::Result<()> {
    squatform_lib::run()
}
