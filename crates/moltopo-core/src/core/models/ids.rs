use slotmap::new_key_type;

new_key_type! {
    pub struct SiteId;
    pub struct AtomTypeId;
    pub struct BondTypeId;
    pub struct AngleTypeId;
    pub struct DihedralTypeId;
    pub struct ImproperTypeId;
}
