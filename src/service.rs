//! Read operations for the API layer.
//!
//! Each call takes the current snapshot from the cache, resolves the caller's
//! allow-list against it, and computes over that one snapshot.

use crate::access::{restrict_to_regions, AllowList, RegionDirectory, SessionState, StaticDirectory};
use crate::aggregate::aggregate;
use crate::cache::{SnapshotCache, SnapshotSource};
use crate::completeness::{completeness_at, CompletenessNode};
use crate::config::Config;
use crate::error::Result;
use crate::export::{export_rows, ExportRequest};
use crate::identity::RegionDistrictIdentity;
use crate::loader::CsvSource;
use crate::month::available_months;
use crate::snapshot::Snapshot;
use crate::types::{AggregateRow, ExportRow, FacilityInfo, MonthlyRecord, RegionWithDistricts};
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

/// Latest row for a facility by submission date; earlier rows win ties.
pub fn facility_info(snapshot: &Snapshot, facility_id: &str) -> Option<FacilityInfo> {
    let latest: &MonthlyRecord = snapshot
        .records()
        .iter()
        .filter(|r| r.facility_id == facility_id)
        .fold(None, |best: Option<&MonthlyRecord>, r| match best {
            Some(b) if b.submission_date >= r.submission_date => Some(b),
            _ => Some(r),
        })?;
    Some(FacilityInfo {
        id: latest.facility_id.clone(),
        facility_name: latest.facility_name.clone(),
        region_name: latest.region_name.clone(),
        district_name: latest.district_name.clone(),
        unique_patients: latest.patients,
        vaccine_vial_stock: latest.vaccine_vials,
    })
}

pub struct MonthlyService {
    cache: SnapshotCache<Box<dyn SnapshotSource>>,
    directory: Option<SessionState<Box<dyn RegionDirectory>>>,
}

impl MonthlyService {
    pub fn new(source: Box<dyn SnapshotSource>, freshness: Duration) -> Self {
        Self {
            cache: SnapshotCache::with_freshness(source, freshness),
            directory: None,
        }
    }

    pub fn with_directory(mut self, directory: Box<dyn RegionDirectory>) -> Self {
        self.directory = Some(SessionState::new(directory));
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let service = Self::new(Box::new(CsvSource::new(config.data_path.clone())), config.cache_ttl);
        match &config.allowlist_path {
            Some(path) => {
                info!(path = %path.display(), "using static region allow-list");
                Ok(service.with_directory(Box::new(StaticDirectory::from_path(path)?)))
            }
            None => Ok(service),
        }
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.cache.get()
    }

    /// Re-read the source now, keeping the old snapshot if that fails.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        self.cache.refresh()
    }

    /// Allow-list for `user`. Without a directory or a user, nothing is
    /// restricted.
    pub fn allow_list(&self, user: Option<&str>, snapshot: &Snapshot) -> Result<AllowList> {
        match (&self.directory, user) {
            (Some(directory), Some(email)) => {
                let names = directory.allowed_region_names(email, Utc::now())?;
                Ok(AllowList::resolve(&names, snapshot.identities()))
            }
            _ => Ok(AllowList::Unrestricted),
        }
    }

    pub fn list_regions_and_districts(&self) -> Result<Vec<RegionDistrictIdentity>> {
        Ok(self.snapshot()?.identities().region_district_pairs().to_vec())
    }

    /// Regions the user may see, grouped with their districts. The flag is
    /// true when the user is unrestricted.
    pub fn regions_for_user(&self, user: Option<&str>) -> Result<(Vec<RegionWithDistricts>, bool)> {
        let snapshot = self.snapshot()?;
        let allow = self.allow_list(user, &snapshot)?;
        let regions = restrict_to_regions(snapshot.identities().regions_with_districts(), &allow);
        Ok((regions, allow == AllowList::Unrestricted))
    }

    pub fn available_months(&self) -> Result<Vec<String>> {
        Ok(available_months(self.snapshot()?.records()))
    }

    pub fn facility_by_id(&self, facility_id: &str) -> Result<Option<FacilityInfo>> {
        let snapshot = self.snapshot()?;
        Ok(facility_info(&snapshot, facility_id))
    }

    pub fn aggregate(
        &self,
        user: Option<&str>,
        region_id: Option<&str>,
        district_id: Option<&str>,
        month: Option<&str>,
    ) -> Result<Vec<AggregateRow>> {
        let snapshot = self.snapshot()?;
        let allow = self.allow_list(user, &snapshot)?;
        allow.authorize(region_id)?;
        Ok(restrict_to_regions(aggregate(&snapshot, region_id, district_id, month), &allow))
    }

    pub fn completeness(
        &self,
        user: Option<&str>,
        region_id: Option<&str>,
        district_id: Option<&str>,
    ) -> Result<Vec<CompletenessNode>> {
        self.completeness_at(user, region_id, district_id, Utc::now().date_naive())
    }

    pub fn completeness_at(
        &self,
        user: Option<&str>,
        region_id: Option<&str>,
        district_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<CompletenessNode>> {
        let snapshot = self.snapshot()?;
        let allow = self.allow_list(user, &snapshot)?;
        allow.authorize(region_id)?;
        Ok(restrict_to_regions(
            completeness_at(&snapshot, region_id, district_id, today),
            &allow,
        ))
    }

    pub fn export(&self, user: Option<&str>, request: &ExportRequest) -> Result<Vec<ExportRow>> {
        let snapshot = self.snapshot()?;
        let allow = self.allow_list(user, &snapshot)?;
        export_rows(&snapshot, request, &allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Fixture(Vec<MonthlyRecord>);

    impl SnapshotSource for Fixture {
        fn fetch_records(&self) -> Result<Vec<MonthlyRecord>> {
            Ok(self.0.clone())
        }
    }

    fn rec(fac: &str, region: (&str, &str), submitted: &str, patients: u64) -> MonthlyRecord {
        MonthlyRecord {
            facility_id: fac.into(),
            facility_name: format!("{} HC", fac),
            region_id: region.0.into(),
            region_name: region.1.into(),
            district_id: format!("D-{}", region.0),
            district_name: format!("{} District", region.1),
            patients,
            vaccine_vials: patients * 2,
            report_month: Some("Apr (4/2025)".into()),
            submission_date: submitted.into(),
            ..Default::default()
        }
    }

    fn service() -> MonthlyService {
        let records = vec![
            rec("F1", ("R1", "Arusha"), "2025-04-03", 5),
            rec("F1", ("R1", "Arusha"), "2025-05-03", 8),
            rec("F2", ("R2", "Mtwara"), "2025-05-01", 2),
        ];
        let directory = StaticDirectory::from_json(r#"{"ops@example.org": ["Arusha"], "admin@example.org": []}"#)
            .unwrap();
        MonthlyService::new(Box::new(Fixture(records)), Duration::minutes(60))
            .with_directory(Box::new(directory))
    }

    #[test]
    fn facility_lookup_takes_latest_submission() {
        let info = service().facility_by_id("F1").unwrap().unwrap();
        assert_eq!(info.unique_patients, 8);
        assert_eq!(info.vaccine_vial_stock, 16);
        assert_eq!(info.region_name, "Arusha");
        assert!(service().facility_by_id("F404").unwrap().is_none());
    }

    #[test]
    fn unscoped_aggregate_is_trimmed_for_restricted_user() {
        let svc = service();
        let rows = svc.aggregate(Some("ops@example.org"), None, None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region_id, "R1");
        assert_eq!(rows[0].patients, 13);
        let all = svc.aggregate(Some("admin@example.org"), None, None, None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn scoped_request_outside_allow_list_is_rejected() {
        let svc = service();
        let err = svc.aggregate(Some("ops@example.org"), Some("R2"), None, None).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
        let err = svc
            .completeness(Some("ops@example.org"), Some("R2"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test]
    fn region_listing_reports_restriction() {
        let svc = service();
        let (regions, all) = svc.regions_for_user(Some("ops@example.org")).unwrap();
        assert!(!all);
        assert_eq!(regions.len(), 1);
        let (regions, all) = svc.regions_for_user(None).unwrap();
        assert!(all);
        assert_eq!(regions.len(), 2);
        assert_eq!(svc.list_regions_and_districts().unwrap().len(), 2);
        assert_eq!(svc.available_months().unwrap(), vec!["2025-04"]);
    }

    #[test]
    fn empty_source_gives_empty_views() {
        let svc = MonthlyService::new(Box::new(Fixture(Vec::new())), Duration::minutes(60));
        assert!(svc.list_regions_and_districts().unwrap().is_empty());
        assert!(svc.available_months().unwrap().is_empty());
        assert!(svc.facility_by_id("F1").unwrap().is_none());
        assert!(svc.aggregate(None, None, None, None).unwrap().is_empty());
        assert!(svc.completeness(None, None, None).unwrap().is_empty());
        assert!(svc.export(None, &ExportRequest::default()).unwrap().is_empty());
    }
}
