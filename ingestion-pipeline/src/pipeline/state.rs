use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Deduplicated, Annotated, Embedded, ArtifactStored, VectorStored, Failed],
    events {
        deduplicate { transition: { from: Ready, to: Deduplicated } }
        annotate { transition: { from: Deduplicated, to: Annotated } }
        embed { transition: { from: Annotated, to: Embedded } }
        store_artifact { transition: { from: Embedded, to: ArtifactStored } }
        store_vector { transition: { from: ArtifactStored, to: VectorStored } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Deduplicated, to: Failed }
            transition: { from: Annotated, to: Failed }
            transition: { from: Embedded, to: Failed }
            transition: { from: ArtifactStored, to: Failed }
        }
    }
}

pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
